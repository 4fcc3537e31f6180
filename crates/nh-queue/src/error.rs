use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,

    #[error("queue is full")]
    Full,

    #[error("context cancelled")]
    Cancelled,

    #[error("item not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "durable")]
    #[error("database error: {0}")]
    Database(String),
}

#[cfg(feature = "durable")]
impl From<sqlx::Error> for QueueError {
    fn from(e: sqlx::Error) -> Self {
        QueueError::Database(e.to_string())
    }
}
