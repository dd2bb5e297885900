use serde::{Deserialize, Serialize};

/// Notifications fanned out by the realtime hub after a store write.
///
/// Handlers never merge these into cached state directly; they invalidate
/// the affected cache entries and let the next read re-fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RealtimeEvent {
    MessageInserted {
        conversation_id: String,
        message_id: String,
        sender_id: Option<String>,
        created_at: i64,
    },
}
