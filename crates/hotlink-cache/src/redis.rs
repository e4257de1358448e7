use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use std::future::Future;
use std::time::Duration;
use tracing::trace;

use crate::{CacheBackend, CacheError, Result};

const DEFAULT_KEY_PREFIX: &str = "hl:url:";
const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(500);

/// A Redis-based implementation of [`CacheBackend`].
///
/// Values are stored as plain strings under a configurable key prefix.
/// The connection manager reconnects after the server goes away. Commands
/// that exceed the operation timeout fail with [`CacheError::Timeout`].
#[derive(Clone)]
pub struct RedisCacheBackend {
    conn: ConnectionManager,
    key_prefix: String,
    op_timeout: Duration,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        CacheError::Timeout(message)
    } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        CacheError::Unavailable(message)
    } else {
        CacheError::Operation(message)
    }
}

impl RedisCacheBackend {
    /// Opens a managed connection to the Redis server at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Unavailable(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        Ok(Self::new(conn))
    }

    /// Creates a backend over an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    /// Replaces the key prefix (e.g., "myapp:url:").
    pub fn with_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    /// Replaces the per-command timeout.
    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    fn cache_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn run<T, F>(&self, operation: &str, command: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(map_redis_error(operation, e)),
            Err(_) => Err(CacheError::Timeout(format!(
                "{operation}: no reply within {:?}",
                self.op_timeout
            ))),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = self.cache_key(key);
        trace!(key = %key, "GET");

        let mut conn = self.conn.clone();
        self.run("failed to fetch value from Redis", conn.get(&key))
            .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let key = self.cache_key(key);
        // SET EX has whole-second resolution and rejects zero.
        let seconds = ttl.as_secs().max(1);
        trace!(key = %key, ttl_secs = seconds, "SET EX");

        let mut conn = self.conn.clone();
        self.run(
            "failed to write value to Redis",
            conn.set_ex::<_, _, ()>(&key, value, seconds),
        )
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = self.cache_key(key);
        trace!(key = %key, "DEL");

        let mut conn = self.conn.clone();
        self.run("failed to delete value from Redis", conn.del::<_, ()>(&key))
            .await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let key = self.cache_key(key);
        trace!(key = %key, "EXISTS");

        let mut conn = self.conn.clone();
        self.run("failed to check key in Redis", conn.exists(&key))
            .await
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let prefixed: Vec<String> = keys.iter().map(|k| self.cache_key(k)).collect();
        trace!(count = prefixed.len(), "MGET");

        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = self
            .run("failed to fetch values from Redis", conn.mget(&prefixed))
            .await?;

        if values.len() != keys.len() {
            return Err(CacheError::InvalidData(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let key = self.cache_key(key);
        trace!(key = %key, "TTL");

        let mut conn = self.conn.clone();
        let seconds: i64 = self
            .run("failed to read TTL from Redis", conn.ttl(&key))
            .await?;

        // -2: no such key, -1: key without expiry.
        Ok(match seconds {
            -2 => None,
            -1 => Some(Duration::MAX),
            s => Some(Duration::from_secs(u64::try_from(s).unwrap_or(0))),
        })
    }
}

