#![allow(dead_code)]

use async_trait::async_trait;
use futures::future::BoxFuture;
use queue_backend::{
    BaseConfig, BaseQueue, Context, QueueError, QueueTimings, redis_queue::RedisQueue,
    store::RedisStore,
};
use redis::{ErrorKind, RedisError, RedisResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};
use tracing_subscriber::{EnvFilter, fmt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Initializes logging for integration tests with a consistent configuration.
/// This function is safe to call multiple times as it will only initialize logging once.
pub fn init_test_logging() {
    INIT.call_once(|| {
        // Create an environment filter that can be controlled via RUST_LOG
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("queue_backend=debug,redis=info,test=debug"));

        let fmt_layer = fmt::layer()
            .with_test_writer()
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(true);

        use tracing_subscriber::layer::SubscriberExt;
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
    });
}

#[derive(Default)]
struct MockState {
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    sets: HashMap<String, Vec<Vec<u8>>>,
}

/// A very primitive in-memory Redis, implementing only the commands the
/// queue backend issues.
#[derive(Default)]
pub struct InMemoryMockRedis {
    state: Mutex<MockState>,
    ping_failures: AtomicUsize,
    pings: AtomicUsize,
    broken: AtomicBool,
    closed: AtomicBool,
}

impl InMemoryMockRedis {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `n` pings with a connection error.
    pub fn fail_pings(&self, n: usize) {
        self.ping_failures.store(n, Ordering::SeqCst);
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// Make every list and set command fail with an I/O error.
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn list_keys(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.lists.keys().cloned().collect()
    }

    pub fn set_keys(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.sets.keys().cloned().collect()
    }

    pub fn set_members(&self, key: &str) -> Vec<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.sets.get(key).cloned().unwrap_or_default()
    }

    fn check_broken(&self) -> RedisResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(RedisError::from((ErrorKind::IoError, "broken pipe")));
        }
        Ok(())
    }
}

#[async_trait]
impl RedisStore for InMemoryMockRedis {
    async fn ping(&self) -> RedisResult<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        let failures = self.ping_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.ping_failures.store(failures - 1, Ordering::SeqCst);
            return Err(RedisError::from((ErrorKind::IoError, "connection refused")));
        }
        Ok(())
    }

    async fn llen(&self, key: &str) -> RedisResult<usize> {
        self.check_broken()?;
        let state = self.state.lock().unwrap();
        Ok(state.lists.get(key).map_or(0, VecDeque::len))
    }

    async fn rpush(&self, key: &str, data: &[u8]) -> RedisResult<()> {
        self.check_broken()?;
        let mut state = self.state.lock().unwrap();
        state
            .lists
            .entry(key.to_string())
            .or_default()
            .push_back(data.to_vec());
        Ok(())
    }

    async fn lpop(&self, key: &str) -> RedisResult<Option<Vec<u8>>> {
        self.check_broken()?;
        let mut state = self.state.lock().unwrap();
        Ok(state.lists.get_mut(key).and_then(VecDeque::pop_front))
    }

    async fn sadd(&self, key: &str, data: &[u8]) -> RedisResult<usize> {
        self.check_broken()?;
        let mut state = self.state.lock().unwrap();
        let set = state.sets.entry(key.to_string()).or_default();
        if set.iter().any(|member| member == data) {
            return Ok(0);
        }
        set.push(data.to_vec());
        Ok(1)
    }

    async fn srem(&self, key: &str, data: &[u8]) -> RedisResult<usize> {
        self.check_broken()?;
        let mut state = self.state.lock().unwrap();
        let Some(set) = state.sets.get_mut(key) else {
            return Err(RedisError::from((ErrorKind::ResponseError, "queue not found")));
        };
        if set.is_empty() {
            return Err(RedisError::from((ErrorKind::ResponseError, "queue is empty")));
        }
        let before = set.len();
        set.retain(|member| member != data);
        Ok(before - set.len())
    }

    async fn sismember(&self, key: &str, data: &[u8]) -> RedisResult<bool> {
        self.check_broken()?;
        let state = self.state.lock().unwrap();
        let Some(set) = state.sets.get(key) else {
            return Err(RedisError::from((ErrorKind::ResponseError, "queue not found")));
        };
        Ok(set.iter().any(|member| member == data))
    }

    async fn del(&self, key: &str) -> RedisResult<()> {
        self.check_broken()?;
        let mut state = self.state.lock().unwrap();
        state.lists.remove(key);
        state.sets.remove(key);
        Ok(())
    }

    async fn close(&self) -> RedisResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub type QueueFuture = BoxFuture<'static, queue_backend::Result<Box<dyn BaseQueue>>>;
pub type QueueFactory = Box<dyn Fn(BaseConfig, QueueTimings) -> QueueFuture>;

async fn open_mock_queue(
    store: Arc<InMemoryMockRedis>,
    cfg: BaseConfig,
    timings: QueueTimings,
    unique: bool,
) -> queue_backend::Result<Box<dyn BaseQueue>> {
    let queue = RedisQueue::with_client(cfg, unique, store)
        .await?
        .with_timings(timings);
    Ok(Box::new(queue))
}

/// Builds Redis backends that all share `store`.
pub fn mock_queue_factory(store: Arc<InMemoryMockRedis>, unique: bool) -> QueueFactory {
    Box::new(
        move |cfg: BaseConfig, timings: QueueTimings| -> QueueFuture {
            Box::pin(open_mock_queue(store.clone(), cfg, timings, unique))
        },
    )
}

pub fn test_config(managed_name: &str, conn_str: &str) -> BaseConfig {
    let settings = queue_backend::QueueSettings {
        length: 10,
        conn_str: conn_str.to_string(),
        ..Default::default()
    };
    queue_backend::to_base_config(managed_name, &settings)
}

/// Behaviour every backend must share: FIFO order, dedup, blocking pop and
/// push, cancellation and reset.
pub async fn test_queue_basic(new_fn: &QueueFactory, cfg: BaseConfig, unique: bool) {
    tracing::info!(
        queue = %cfg.managed_name,
        unique,
        "running queue conformance suite"
    );
    let timings = QueueTimings::default();
    let q = new_fn(cfg.clone(), timings)
        .await
        .expect("Failed to create queue");

    let ctx = Context::background();
    q.remove_all(&ctx).await.expect("Failed to reset queue");
    assert_eq!(q.len(&ctx).await.unwrap(), 0);

    // push the first item
    q.push_item(&ctx, b"foo").await.expect("Failed to push foo");
    assert_eq!(q.len(&ctx).await.unwrap(), 1);

    // push a duplicate item
    let result = q.push_item(&ctx, b"foo").await;
    if unique {
        assert!(matches!(result, Err(QueueError::AlreadyInQueue)));
    } else {
        result.expect("non-unique queues accept duplicates");
    }

    // check the duplicate item
    let cnt = q.len(&ctx).await.unwrap();
    let has = q.has_item(&ctx, b"foo").await.unwrap();
    if unique {
        assert_eq!(cnt, 1);
        assert!(has);
    } else {
        assert_eq!(cnt, 2);
        assert!(!has, "non-unique queues don't track members");
    }

    // push another item
    q.push_item(&ctx, b"bar").await.expect("Failed to push bar");

    // pop the first item (and the duplicate if non-unique)
    assert_eq!(q.pop_item(&ctx).await.unwrap().as_deref(), Some(&b"foo"[..]));
    if !unique {
        assert_eq!(q.pop_item(&ctx).await.unwrap().as_deref(), Some(&b"foo"[..]));
    }

    // pop another item
    assert_eq!(q.pop_item(&ctx).await.unwrap().as_deref(), Some(&b"bar"[..]));

    // pop an empty queue (timeout, cancel)
    let timed = ctx.with_timeout(Duration::from_millis(10));
    let result = q.pop_item(&timed).await;
    assert!(matches!(result, Err(QueueError::DeadlineExceeded)));

    let timed = ctx.with_timeout(Duration::from_millis(10));
    timed.cancel();
    let started = Instant::now();
    let result = q.pop_item(&timed).await;
    assert!(matches!(result, Err(QueueError::Canceled)));
    assert!(started.elapsed() < Duration::from_millis(10));

    // test blocking push if queue is full
    for i in 0..cfg.length {
        q.push_item(&ctx, format!("item-{i}").as_bytes())
            .await
            .expect("Failed to fill queue");
    }
    let timed = ctx.with_timeout(Duration::from_millis(10));
    let result = q.push_item(&timed, b"item-full").await;
    assert!(matches!(result, Err(QueueError::DeadlineExceeded)));

    // test blocking push if queue is full (with a short push block time)
    let short = QueueTimings {
        push_block_time: Duration::from_millis(30),
        ..timings
    };
    let q_short = new_fn(cfg.clone(), short)
        .await
        .expect("Failed to create queue");
    let started = Instant::now();
    let result = q_short.push_item(&ctx, b"item-full").await;
    assert!(matches!(result, Err(QueueError::DeadlineExceeded)));
    assert!(started.elapsed() >= short.push_block_time * 2 / 3);

    // remove all
    assert_eq!(q.len(&ctx).await.unwrap(), cfg.length);
    q.remove_all(&ctx).await.expect("Failed to remove all");
    assert_eq!(q.len(&ctx).await.unwrap(), 0);
}
