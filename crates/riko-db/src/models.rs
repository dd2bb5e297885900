use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: String,
    pub kind: String,
    pub title: Option<String>,
    pub last_message_at: Option<i64>,
    pub last_message_preview: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Participant {
    pub id: i64,
    pub conversation_id: String,
    pub user_id: String,
    pub role: String,
    pub last_read_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: Option<String>,
    pub content: String,
    pub message_type: String,
    pub media_url: Option<String>,
    pub shared_post_id: Option<String>,
    pub edited: bool,
    pub deleted: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub handle: Option<String>,
}

/// Input for a message insert. `created_at` is caller-supplied so the worker
/// can stamp a single "now" across a whole mutation.
#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    pub conversation_id: &'a str,
    pub sender_id: Option<&'a str>,
    pub content: &'a str,
    pub message_type: &'a str,
    pub media_url: Option<&'a str>,
    pub shared_post_id: Option<&'a str>,
    pub created_at: i64,
}
