use async_trait::async_trait;
use hotlink_core::CacheError;
use std::time::Duration;

/// Type alias for cache results.
pub type Result<T> = std::result::Result<T, CacheError>;

/// A key/value store with per-key expiration.
///
/// Backends report failures as [`CacheError`]; absorbing them is the job of
/// [`CacheLayer`](crate::CacheLayer).
#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    /// Returns `Ok(None)` if the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key` for `ttl`, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// It is not an error if the key does not exist.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Fetches several keys at once. The result has one slot per input key,
    /// in the same order.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Remaining lifetime of `key`, or `None` if it is absent.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;
}
