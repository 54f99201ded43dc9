pub mod backoff;
pub mod config;
pub mod context;
pub mod dummy_queue;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod redis_queue;
pub mod store;

pub use config::{BaseConfig, QueueSettings, QueueTimings, to_base_config};
pub use context::Context;
pub use error::{QueueError, Result};
pub use queue::{BaseQueue, QueueType, new_base_queue};
