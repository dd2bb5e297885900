#[derive(Debug, Clone)]
pub enum WorkerEvent {
    NewMessage {
        conversation_id: String,
        message_id: String,
        sender_id: Option<String>,
        created_at: i64,
    },
    ConversationCreated {
        conversation_id: String,
    },
}
