use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{
    backoff::{Attempt, backoff_err, backoff_ret_err},
    config::{BaseConfig, QueueTimings},
    context::Context,
    error::{QueueError, Result},
    metrics::Metrics,
    queue::BaseQueue,
    store::{RedisStore, get_redis_client, parse_conn_str},
};

const STARTUP_PROBES: usize = 10;
const STARTUP_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// A queue stored in a Redis list, with an optional companion set tracking
/// the members currently enqueued.
///
/// Compound sequences (length check then push, pop then set removal) are
/// serialized by a process-local lock only. Several processes sharing the
/// same keys can still interleave them: a full queue may briefly overshoot
/// its length, and the set may briefly disagree with the list.
pub struct RedisQueue {
    client: Arc<dyn RedisStore>,
    unique: bool,
    cfg: BaseConfig,
    prefix: String,
    timings: QueueTimings,
    metrics: Option<Arc<dyn Metrics>>,
    lock: Mutex<()>,
}

impl RedisQueue {
    /// Create a queue on the shared client for `cfg.conn_str`.
    pub async fn new(cfg: BaseConfig, unique: bool) -> Result<Self> {
        let conn = parse_conn_str(&cfg.conn_str)?;
        let client = get_redis_client(&conn.uri)?;
        Self::with_client(cfg, unique, client).await
    }

    /// Create a queue on an existing store handle.
    ///
    /// The store is probed up to ten times, one second apart, before giving up.
    pub async fn with_client(
        cfg: BaseConfig,
        unique: bool,
        client: Arc<dyn RedisStore>,
    ) -> Result<Self> {
        if cfg.queue_full_name.is_empty() {
            return Err(QueueError::Configuration(
                "Queue name cannot be empty".to_string(),
            ));
        }
        if unique && cfg.set_full_name.is_empty() {
            return Err(QueueError::Configuration(
                "Unique queues need a set name".to_string(),
            ));
        }
        let prefix = parse_conn_str(&cfg.conn_str)
            .map(|conn| conn.prefix)
            .unwrap_or_default();

        wait_until_ready(client.as_ref()).await?;

        log::debug!(
            "Redis queue {} ready: list={}{} set={}{} unique={}",
            cfg.managed_name,
            prefix,
            cfg.queue_full_name,
            prefix,
            cfg.set_full_name,
            unique
        );

        Ok(Self {
            client,
            unique,
            cfg,
            prefix,
            timings: QueueTimings::default(),
            metrics: None,
            lock: Mutex::new(()),
        })
    }

    /// Override the push/pop wait windows for this queue
    pub fn with_timings(mut self, timings: QueueTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Set metrics collector for this queue
    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &BaseConfig {
        &self.cfg
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    fn list_key(&self) -> String {
        format!("{}{}", self.prefix, self.cfg.queue_full_name)
    }

    fn set_key(&self) -> String {
        format!("{}{}", self.prefix, self.cfg.set_full_name)
    }

    /// One push attempt: `Retry` while the list is full.
    async fn try_push(&self, list_key: &str, set_key: &str, data: &[u8]) -> Result<Attempt<()>> {
        let _guard = self.lock.lock().await;

        let depth = self.client.llen(list_key).await?;
        if depth >= self.cfg.length {
            return Ok(Attempt::Retry);
        }

        if self.unique && self.client.sadd(set_key, data).await? == 0 {
            return Err(QueueError::AlreadyInQueue);
        }
        self.client.rpush(list_key, data).await?;
        self.record_depth(depth + 1);
        Ok(Attempt::Done(()))
    }

    /// One pop attempt: `Retry` while the list is empty.
    async fn try_pop(&self, list_key: &str, set_key: &str) -> Result<Attempt<Vec<u8>>> {
        let _guard = self.lock.lock().await;

        let Some(data) = self.client.lpop(list_key).await? else {
            return Ok(Attempt::Retry);
        };
        if self.unique {
            // The item has left the list already; nothing sound to roll back to.
            if let Err(e) = self.client.srem(set_key, &data).await {
                log::warn!(
                    "Failed to untrack popped item in {}: {e}",
                    self.cfg.managed_name
                );
            }
        }
        Ok(Attempt::Done(data))
    }

    fn record_depth(&self, depth: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record_queue_depth(&self.cfg.managed_name, depth as u64);
        }
    }
}

async fn wait_until_ready(client: &dyn RedisStore) -> Result<()> {
    let mut last_err = None;
    for attempt in 1..=STARTUP_PROBES {
        match client.ping().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                log::warn!(
                    "Redis is not ready (probe {attempt}/{STARTUP_PROBES}), retrying in {STARTUP_PROBE_INTERVAL:?}: {e}"
                );
                last_err = Some(e);
            }
        }
        if attempt < STARTUP_PROBES {
            tokio::time::sleep(STARTUP_PROBE_INTERVAL).await;
        }
    }
    Err(QueueError::Connection(format!(
        "Redis unreachable after {STARTUP_PROBES} probes: {}",
        last_err.map(|e| e.to_string()).unwrap_or_default()
    )))
}

#[async_trait]
impl BaseQueue for RedisQueue {
    async fn push_item(&self, ctx: &Context, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(QueueError::EmptyItem);
        }

        let started = Instant::now();
        let end = Some(started + self.timings.push_block_time);
        let list_key = self.list_key();
        let set_key = self.set_key();
        let (list_key, set_key) = (list_key.as_str(), set_key.as_str());

        let result = backoff_err(ctx, &self.timings, end, move || {
            self.try_push(list_key, set_key, data)
        })
        .await;

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(()) => {
                    metrics.record_item_pushed(&self.cfg.managed_name);
                    metrics.record_push_wait(
                        &self.cfg.managed_name,
                        started.elapsed().as_millis() as u64,
                    );
                }
                Err(QueueError::AlreadyInQueue) => {
                    metrics.record_duplicate_rejected(&self.cfg.managed_name)
                }
                Err(_) => {}
            }
        }
        result
    }

    async fn pop_item(&self, ctx: &Context) -> Result<Option<Vec<u8>>> {
        let list_key = self.list_key();
        let set_key = self.set_key();
        let (list_key, set_key) = (list_key.as_str(), set_key.as_str());

        let data = backoff_ret_err(ctx, &self.timings, None, move || {
            self.try_pop(list_key, set_key)
        })
        .await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_item_popped(&self.cfg.managed_name);
        }
        Ok(Some(data))
    }

    async fn has_item(&self, ctx: &Context, data: &[u8]) -> Result<bool> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let _guard = self.lock.lock().await;
        if !self.unique {
            return Ok(false);
        }
        Ok(self.client.sismember(&self.set_key(), data).await?)
    }

    async fn len(&self, ctx: &Context) -> Result<usize> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let _guard = self.lock.lock().await;
        let depth = self.client.llen(&self.list_key()).await?;
        self.record_depth(depth);
        Ok(depth)
    }

    async fn close(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        log::info!("Closing Redis queue {}", self.cfg.managed_name);
        Ok(self.client.close().await?)
    }

    async fn remove_all(&self, ctx: &Context) -> Result<()> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let _guard = self.lock.lock().await;

        // The set goes after the list: with no transaction, a duplicate
        // surviving is acceptable, an untracked item is not.
        let list = self.client.del(&self.list_key()).await;
        let set = self.client.del(&self.set_key()).await;
        list?;
        set?;
        self.record_depth(0);
        Ok(())
    }
}
