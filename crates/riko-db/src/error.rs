use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Could not resolve data directory")]
    NoDataDir,
}

pub type Result<T> = std::result::Result<T, DbError>;
