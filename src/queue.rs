use async_trait::async_trait;
use std::str::FromStr;

use crate::{
    config::BaseConfig,
    context::Context,
    dummy_queue::DummyQueue,
    error::{QueueError, Result},
    redis_queue::RedisQueue,
};

/// The storage contract every queue backend implements.
///
/// Items are opaque byte strings. All operations may be called concurrently
/// on the same instance.
#[async_trait]
pub trait BaseQueue: Send + Sync {
    /// Enqueue `data`, waiting while the queue is at capacity.
    ///
    /// Unique backends return [`QueueError::AlreadyInQueue`] when `data` is
    /// already enqueued.
    async fn push_item(&self, ctx: &Context, data: &[u8]) -> Result<()>;

    /// Dequeue the oldest item, waiting while the queue is empty.
    ///
    /// `Ok(None)` is only returned by backends that can never produce an item.
    async fn pop_item(&self, ctx: &Context) -> Result<Option<Vec<u8>>>;

    /// Whether `data` is currently enqueued. Always false without uniqueness tracking.
    async fn has_item(&self, ctx: &Context, data: &[u8]) -> Result<bool>;

    async fn len(&self, ctx: &Context) -> Result<usize>;

    /// Release backend resources. Call at most once.
    async fn close(&self) -> Result<()>;

    /// Drop every queued item and all uniqueness tracking.
    async fn remove_all(&self, ctx: &Context) -> Result<()>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueueType {
    Dummy,
    #[default]
    Redis,
}

impl FromStr for QueueType {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dummy" | "immediate" => Ok(Self::Dummy),
            "redis" => Ok(Self::Redis),
            other => Err(QueueError::Configuration(format!(
                "Unsupported queue type: {other}"
            ))),
        }
    }
}

/// Build the backend selected by `queue_type` using the shared client for `cfg.conn_str`.
pub async fn new_base_queue(
    queue_type: QueueType,
    cfg: BaseConfig,
    unique: bool,
) -> Result<Box<dyn BaseQueue>> {
    match queue_type {
        QueueType::Dummy => Ok(Box::new(DummyQueue::new(cfg, unique))),
        QueueType::Redis => Ok(Box::new(RedisQueue::new(cfg, unique).await?)),
    }
}
