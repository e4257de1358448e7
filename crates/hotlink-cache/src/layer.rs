use hotlink_core::MappingRecord;
use jiff::Timestamp;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::{CacheBackend, TtlPolicy};

/// The cache as seen by the read path.
///
/// Every operation is fail-soft: backend errors are logged at `warn` and
/// turned into "absent", `false`, or a no-op. Callers never see a
/// [`CacheError`](crate::CacheError).
#[derive(Clone)]
pub struct CacheLayer {
    backend: Arc<dyn CacheBackend>,
    policy: TtlPolicy,
}

impl CacheLayer {
    pub fn new(backend: Arc<dyn CacheBackend>, policy: TtlPolicy) -> Self {
        Self { backend, policy }
    }

    /// Wraps a backend with the default [`TtlPolicy`].
    pub fn with_default_policy(backend: Arc<dyn CacheBackend>) -> Self {
        Self::new(backend, TtlPolicy::default())
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Cache get failed, treating as miss");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) {
        trace!(key, ttl_secs = ttl.as_secs(), "Populating cache");
        if let Err(e) = self.backend.set(key, value, ttl).await {
            warn!(key, error = %e, "Cache set failed, skipping");
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            warn!(key, error = %e, "Cache delete failed, skipping");
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        match self.backend.exists(key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(key, error = %e, "Cache exists failed, treating as absent");
                false
            }
        }
    }

    /// One slot per key, in input order. All slots are `None` on failure.
    pub async fn multi_get(&self, keys: &[String]) -> Vec<Option<String>> {
        match self.backend.multi_get(keys).await {
            Ok(values) => values,
            Err(e) => {
                warn!(count = keys.len(), error = %e, "Cache multi_get failed, treating all as misses");
                vec![None; keys.len()]
            }
        }
    }

    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        match self.backend.ttl(key).await {
            Ok(ttl) => ttl,
            Err(e) => {
                warn!(key, error = %e, "Cache ttl failed, treating as absent");
                None
            }
        }
    }

    /// Caches `value` with the popularity-based lifetime for `base_access_count`.
    pub async fn set_with_popularity_bonus(&self, key: &str, value: &str, base_access_count: u64) {
        let ttl = self.policy.popularity_ttl(base_access_count);
        self.set(key, value, ttl).await;
    }

    /// Caches `value` until `expire_at`, rounded down to whole seconds.
    ///
    /// Returns `false` without touching the cache when less than a second is left.
    pub async fn set_until(&self, key: &str, value: &str, expire_at: Timestamp) -> bool {
        match self.policy.expiration_ttl(expire_at, Timestamp::now()) {
            Some(ttl) => {
                self.set(key, value, ttl).await;
                true
            }
            None => {
                debug!(key, "Mapping expires too soon to cache");
                false
            }
        }
    }

    /// Caches a mapping under its short code with the lifetime the policy picks.
    ///
    /// Returns `false` if the mapping was not cacheable.
    pub async fn populate(&self, record: &MappingRecord) -> bool {
        let key = record.code.as_str();
        match record.expire_at {
            Some(expire_at) => self.set_until(key, &record.target_url, expire_at).await,
            None => {
                self.set_with_popularity_bonus(key, &record.target_url, record.access_count)
                    .await;
                true
            }
        }
    }
}

impl std::fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheError, MokaCacheBackend, Result};
    use async_trait::async_trait;
    use hotlink_core::ShortCode;
    use jiff::ToSpan;

    /// A backend whose every call fails, like a Redis that went away.
    struct DownBackend;

    #[async_trait]
    impl CacheBackend for DownBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Err(CacheError::Timeout("no reply".into()))
        }

        async fn exists(&self, _key: &str) -> Result<bool> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn multi_get(&self, _keys: &[String]) -> Result<Vec<Option<String>>> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn ttl(&self, _key: &str) -> Result<Option<Duration>> {
            Err(CacheError::Operation("boom".into()))
        }
    }

    fn moka_layer() -> CacheLayer {
        CacheLayer::with_default_policy(Arc::new(MokaCacheBackend::new()))
    }

    #[tokio::test]
    async fn failures_are_absorbed() {
        let layer = CacheLayer::with_default_policy(Arc::new(DownBackend));

        assert_eq!(layer.get("abc").await, None);
        assert!(!layer.exists("abc").await);
        assert_eq!(layer.ttl("abc").await, None);
        layer.set("abc", "https://x.com", Duration::from_secs(60)).await;
        layer.delete("abc").await;

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(layer.multi_get(&keys).await, vec![None, None, None]);
    }

    #[tokio::test]
    async fn popularity_bonus_extends_ttl() {
        let layer = moka_layer();
        layer
            .set_with_popularity_bonus("cold", "https://a.com", 0)
            .await;
        layer
            .set_with_popularity_bonus("hot", "https://b.com", 100)
            .await;

        let cold = layer.ttl("cold").await.unwrap();
        let hot = layer.ttl("hot").await.unwrap();
        assert!(cold <= Duration::from_secs(3600));
        assert!(cold > Duration::from_secs(3590));
        assert!(hot > Duration::from_secs(4590));
    }

    #[tokio::test]
    async fn set_until_skips_short_lived_values() {
        let layer = moka_layer();

        let cached = layer
            .set_until("soon", "https://a.com", Timestamp::now() + 500.milliseconds())
            .await;
        assert!(!cached);
        assert_eq!(layer.get("soon").await, None);

        let cached = layer
            .set_until("later", "https://b.com", Timestamp::now() + 120.seconds())
            .await;
        assert!(cached);
        let ttl = layer.ttl("later").await.unwrap();
        assert!(ttl <= Duration::from_secs(120));
    }

    #[tokio::test]
    async fn populate_uses_record_lifetime() {
        let layer = moka_layer();
        let record = MappingRecord::new(ShortCode::new_unchecked("abc"), "https://x.com", None);
        assert!(layer.populate(&record).await);
        assert_eq!(layer.get("abc").await.as_deref(), Some("https://x.com"));
        assert!(layer.ttl("abc").await.unwrap() > Duration::from_secs(3590));

        let expired = MappingRecord::new(
            ShortCode::new_unchecked("old"),
            "https://y.com",
            Some(Timestamp::now() - 5.seconds()),
        );
        assert!(!layer.populate(&expired).await);
        assert!(!layer.exists("old").await);
    }
}
