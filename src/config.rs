use serde::Deserialize;
use std::time::Duration;

use crate::error::QueueError;

/// Storage layout and capacity of one logical queue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BaseConfig {
    /// Human readable queue name, used for logging and metrics.
    pub managed_name: String,
    /// Key of the FIFO list.
    pub queue_full_name: String,
    /// Key of the membership set used by unique queues.
    pub set_full_name: String,
    /// Maximum number of items the FIFO may hold.
    pub length: usize,
    /// Backend connection string, e.g. `redis://127.0.0.1:6379/0?prefix=app:`.
    pub conn_str: String,
}

/// User-facing queue settings, as found in a configuration file.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueueSettings {
    #[serde(rename = "type")]
    pub queue_type: String,
    pub length: usize,
    pub conn_str: String,
    pub queue_name: String,
    pub set_name: String,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            queue_type: "redis".to_string(),
            length: 100,
            conn_str: "redis://127.0.0.1:6379/0".to_string(),
            queue_name: "_queue".to_string(),
            set_name: "_unique".to_string(),
        }
    }
}

impl QueueSettings {
    /// Parse settings from a JSON document. Missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, QueueError> {
        let settings: Self = serde_json::from_str(raw)?;
        if settings.length == 0 {
            return Err(QueueError::Configuration(
                "Queue length must be greater than zero".to_string(),
            ));
        }
        Ok(settings)
    }
}

/// Derive the storage key names for `managed_name` from `settings`.
pub fn to_base_config(managed_name: &str, settings: &QueueSettings) -> BaseConfig {
    let queue_full_name = format!("{managed_name}{}", settings.queue_name);
    let mut set_full_name = format!("{queue_full_name}{}", settings.set_name);
    if set_full_name == queue_full_name {
        set_full_name.push_str("_unique");
    }

    BaseConfig {
        managed_name: managed_name.to_string(),
        queue_full_name,
        set_full_name,
        length: settings.length,
        conn_str: settings.conn_str.clone(),
    }
}

/// Wait windows used by blocking push and pop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueTimings {
    /// How long a push waits for free capacity before failing.
    pub push_block_time: Duration,
    /// First wait between two attempts.
    pub backoff_begin: Duration,
    /// Ceiling for the doubling wait.
    pub backoff_upper: Duration,
}

impl Default for QueueTimings {
    fn default() -> Self {
        Self {
            push_block_time: Duration::from_secs(1),
            backoff_begin: Duration::from_millis(50),
            backoff_upper: Duration::from_secs(2),
        }
    }
}
