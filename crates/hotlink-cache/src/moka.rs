use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::Expiry;
use std::time::{Duration, Instant};
use tracing::trace;

use crate::{CacheBackend, Result};

/// A cached value together with the lifetime it was stored with.
#[derive(Debug, Clone)]
struct Slot {
    value: String,
    ttl: Duration,
    stored_at: Instant,
}

/// Expires each slot after the TTL it was written with.
struct PerSlotExpiry;

impl Expiry<String, Slot> for PerSlotExpiry {
    fn expire_after_create(&self, _key: &String, slot: &Slot, _created_at: Instant) -> Option<Duration> {
        Some(slot.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(slot.ttl)
    }
}

/// An in-process [`CacheBackend`] built on Moka.
///
/// Suitable for single-node deployments and tests. Each entry carries its
/// own TTL, so popularity-based lifetimes work the same as with Redis.
///
/// An unbounded cache only drops entries when their TTL runs out. A bounded
/// one also evicts by size once full, using Moka's TinyLFU admission, so a
/// popular entry may leave before its TTL does.
#[derive(Clone)]
pub struct MokaCacheBackend {
    cache: Cache<String, Slot>,
}

impl MokaCacheBackend {
    /// Creates an unbounded cache.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a cache holding at most `max_capacity` entries. 0 means
    /// unbounded.
    pub fn with_capacity(max_capacity: u64) -> Self {
        let mut builder = Cache::builder().expire_after(PerSlotExpiry);
        if max_capacity > 0 {
            builder = builder.max_capacity(max_capacity);
        }
        Self {
            cache: builder.build(),
        }
    }

    /// Number of live entries, after pending maintenance has run.
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Default for MokaCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MokaCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        trace!(key, "Fetching value from Moka cache");
        Ok(self.cache.get(key).await.map(|slot| slot.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        trace!(key, ttl_secs = ttl.as_secs(), "Storing value in Moka cache");
        let slot = Slot {
            value: value.to_string(),
            ttl,
            stored_at: Instant::now(),
        };
        self.cache.insert(key.to_string(), slot).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        trace!(key, "Removing value from Moka cache");
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.cache.get(key).await.is_some())
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.cache.get(key.as_str()).await.map(|slot| slot.value));
        }
        Ok(values)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        Ok(self
            .cache
            .get(key)
            .await
            .map(|slot| slot.ttl.saturating_sub(slot.stored_at.elapsed())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_and_get() {
        let cache = MokaCacheBackend::new();
        cache
            .set("abc", "https://example.com", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            cache.get("abc").await.unwrap().as_deref(),
            Some("https://example.com")
        );
        assert!(cache.exists("abc").await.unwrap());
    }

    #[tokio::test]
    async fn missing_key() {
        let cache = MokaCacheBackend::new();
        assert!(cache.get("nope").await.unwrap().is_none());
        assert!(!cache.exists("nope").await.unwrap());
        assert!(cache.ttl("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = MokaCacheBackend::new();
        cache
            .set("abc", "https://example.com", Duration::from_secs(60))
            .await
            .unwrap();
        cache.delete("abc").await.unwrap();
        assert!(cache.get("abc").await.unwrap().is_none());

        // Deleting again is fine
        cache.delete("abc").await.unwrap();
    }

    #[tokio::test]
    async fn entries_expire_after_their_own_ttl() {
        let cache = MokaCacheBackend::new();
        cache
            .set("short", "https://a.com", Duration::from_millis(200))
            .await
            .unwrap();
        cache
            .set("long", "https://b.com", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(cache.get("short").await.unwrap().is_none());
        assert!(cache.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn overwrite_resets_ttl() {
        let cache = MokaCacheBackend::new();
        cache
            .set("abc", "https://old.com", Duration::from_secs(10))
            .await
            .unwrap();
        cache
            .set("abc", "https://new.com", Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(
            cache.get("abc").await.unwrap().as_deref(),
            Some("https://new.com")
        );
        let ttl = cache.ttl("abc").await.unwrap().unwrap();
        assert!(ttl > Duration::from_secs(3500));
    }

    #[tokio::test]
    async fn multi_get_preserves_order() {
        let cache = MokaCacheBackend::new();
        cache
            .set("one", "https://1.com", Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("three", "https://3.com", Duration::from_secs(60))
            .await
            .unwrap();

        let keys = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let values = cache.multi_get(&keys).await.unwrap();
        assert_eq!(
            values,
            vec![
                Some("https://1.com".to_string()),
                None,
                Some("https://3.com".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn unbounded_cache_only_drops_on_ttl() {
        let cache = MokaCacheBackend::new();
        for i in 0..2_000 {
            cache
                .set(&format!("k{i}"), "https://example.com", Duration::from_secs(60))
                .await
                .unwrap();
        }

        assert_eq!(cache.entry_count().await, 2_000);
        assert!(cache.get("k0").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn bounded_cache_evicts_by_size() {
        let cache = MokaCacheBackend::with_capacity(100);
        for i in 0..2_000 {
            cache
                .set(&format!("k{i}"), "https://example.com", Duration::from_secs(60))
                .await
                .unwrap();
        }

        assert!(cache.entry_count().await <= 100);
    }
}
