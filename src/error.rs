use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    /// The item is already tracked by a unique queue. This is an expected
    /// outcome of deduplication, not a backend fault.
    #[error("item already in queue")]
    AlreadyInQueue,

    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("queue items must not be empty")]
    EmptyItem,

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QueueError {
    pub fn is_already_in_queue(&self) -> bool {
        matches!(self, Self::AlreadyInQueue)
    }

    /// True for the two errors a [`crate::context::Context`] can produce.
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
