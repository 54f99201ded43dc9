//! The subset of Redis commands the queue backend issues.
//!
//! [`RedisStore`] is the seam that lets tests run the backend against an
//! in-memory double. [`RedisClient`] is the real implementation.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::{AsyncCommands, Client, RedisResult, aio::MultiplexedConnection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::error::QueueError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait RedisStore: Send + Sync {
    async fn ping(&self) -> RedisResult<()>;

    async fn llen(&self, key: &str) -> RedisResult<usize>;

    async fn rpush(&self, key: &str, data: &[u8]) -> RedisResult<()>;

    /// Pop the head of a list. `None` is the store's nil reply for an empty or absent list.
    async fn lpop(&self, key: &str) -> RedisResult<Option<Vec<u8>>>;

    /// Add a set member, returning how many members were added.
    async fn sadd(&self, key: &str, data: &[u8]) -> RedisResult<usize>;

    async fn srem(&self, key: &str, data: &[u8]) -> RedisResult<usize>;

    async fn sismember(&self, key: &str, data: &[u8]) -> RedisResult<bool>;

    async fn del(&self, key: &str) -> RedisResult<()>;

    async fn close(&self) -> RedisResult<()>;
}

/// Connection string split into the URI handed to the driver and the key prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnSettings {
    pub uri: String,
    pub prefix: String,
}

/// Validate a Redis URI and pull the `prefix` query parameter out of it.
pub fn parse_conn_str(conn_str: &str) -> Result<ConnSettings, QueueError> {
    if conn_str.is_empty() {
        return Err(QueueError::Configuration(
            "Redis URL cannot be empty".to_string(),
        ));
    }
    let mut url = redis::parse_redis_url(conn_str)
        .ok_or_else(|| QueueError::Configuration(format!("Invalid Redis URL: {conn_str}")))?;

    let mut prefix = String::new();
    let mut rest = Vec::new();
    for (key, value) in url.query_pairs().into_owned() {
        if key == "prefix" {
            if prefix.is_empty() {
                prefix = value;
            }
        } else {
            rest.push((key, value));
        }
    }

    url.set_query(None);
    if !rest.is_empty() {
        url.query_pairs_mut().extend_pairs(rest);
    }

    Ok(ConnSettings {
        uri: url.to_string(),
        prefix,
    })
}

/// A [`RedisStore`] backed by a multiplexed connection, opened on first use.
pub struct RedisClient {
    client: Client,
    conn: tokio::sync::Mutex<Option<MultiplexedConnection>>,
}

impl RedisClient {
    pub fn open(uri: &str) -> Result<Self, QueueError> {
        let client = Client::open(uri).map_err(|e| QueueError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            conn: tokio::sync::Mutex::new(None),
        })
    }

    async fn get_connection(&self) -> RedisResult<MultiplexedConnection> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = match tokio::time::timeout(
            CONNECT_TIMEOUT,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(conn_result) => conn_result?,
            Err(_) => {
                return Err(redis::RedisError::from((
                    redis::ErrorKind::IoError,
                    "timed out connecting to Redis",
                )));
            }
        };
        *slot = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl RedisStore for RedisClient {
    async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn llen(&self, key: &str) -> RedisResult<usize> {
        let mut conn = self.get_connection().await?;
        conn.llen(key).await
    }

    async fn rpush(&self, key: &str, data: &[u8]) -> RedisResult<()> {
        let mut conn = self.get_connection().await?;
        let _: usize = conn.rpush(key, data).await?;
        Ok(())
    }

    async fn lpop(&self, key: &str) -> RedisResult<Option<Vec<u8>>> {
        let mut conn = self.get_connection().await?;
        conn.lpop(key, None).await
    }

    async fn sadd(&self, key: &str, data: &[u8]) -> RedisResult<usize> {
        let mut conn = self.get_connection().await?;
        conn.sadd(key, data).await
    }

    async fn srem(&self, key: &str, data: &[u8]) -> RedisResult<usize> {
        let mut conn = self.get_connection().await?;
        conn.srem(key, data).await
    }

    async fn sismember(&self, key: &str, data: &[u8]) -> RedisResult<bool> {
        let mut conn = self.get_connection().await?;
        conn.sismember(key, data).await
    }

    async fn del(&self, key: &str) -> RedisResult<()> {
        let mut conn = self.get_connection().await?;
        let _: usize = conn.del(key).await?;
        Ok(())
    }

    async fn close(&self) -> RedisResult<()> {
        // Dropping the last handle shuts the multiplexed connection down.
        self.conn.lock().await.take();
        Ok(())
    }
}

static CLIENTS: Lazy<Mutex<HashMap<String, Weak<RedisClient>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Shared client for `uri`, reused by every queue that is alive and uses the same URI.
pub fn get_redis_client(uri: &str) -> Result<Arc<RedisClient>, QueueError> {
    let mut clients = CLIENTS
        .lock()
        .map_err(|_| QueueError::Connection("Redis client registry poisoned".to_string()))?;

    if let Some(client) = clients.get(uri).and_then(Weak::upgrade) {
        return Ok(client);
    }

    let client = Arc::new(RedisClient::open(uri)?);
    clients.insert(uri.to_string(), Arc::downgrade(&client));
    Ok(client)
}
