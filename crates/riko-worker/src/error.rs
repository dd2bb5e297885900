use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Database error: {0}")]
    Db(#[from] riko_db::DbError),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Message content is empty")]
    EmptyMessage,

    #[error("A conversation needs at least two participants")]
    NotEnoughParticipants,
}

pub type Result<T> = std::result::Result<T, WorkerError>;
