use std::sync::Arc;

use async_trait::async_trait;
use hotlink_cache::CacheLayer;
use hotlink_core::{AccessEvent, AccessNotifier, MappingStore, ShortCode};
use jiff::Timestamp;
use tracing::{debug, trace, warn};

use crate::resolver::{Resolution, Resolver, ServedFrom};
use crate::{ResolveError, Result};

/// Resolves short codes through the cache, falling back to the store.
///
/// On a cache miss the mapping is read from the store, checked for
/// expiration, and written back to the cache with a TTL chosen by the
/// cache's [`TtlPolicy`](hotlink_cache::TtlPolicy). Expired mappings are
/// deleted from both the store and the cache on the spot.
pub struct ResolutionService<S> {
    store: Arc<S>,
    cache: CacheLayer,
    notifier: Arc<dyn AccessNotifier>,
}

impl<S: MappingStore> ResolutionService<S> {
    pub fn new(store: Arc<S>, cache: CacheLayer, notifier: Arc<dyn AccessNotifier>) -> Self {
        Self {
            store,
            cache,
            notifier,
        }
    }

    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    fn notify(&self, code: &ShortCode, source: &str) {
        self.notifier
            .notify(AccessEvent::now(code.clone(), source));
    }

    async fn purge_expired(&self, code: &ShortCode) {
        debug!(code = %code, "Mapping has expired, deleting");
        if let Err(e) = self.store.delete_mapping(code).await {
            warn!(code = %code, error = %e, "Failed to delete expired mapping");
        }
        self.cache.delete(code.as_str()).await;
    }
}

#[async_trait]
impl<S: MappingStore> Resolver for ResolutionService<S> {
    async fn resolve(&self, code: &ShortCode, source: &str) -> Result<Resolution> {
        trace!(code = %code, "Resolving short code");

        if let Some(target_url) = self.cache.get(code.as_str()).await {
            debug!(code = %code, "Cache hit");
            self.notify(code, source);
            return Ok(Resolution {
                target_url,
                served_from: ServedFrom::Cache,
            });
        }

        let record = self.store.find_by_key(code).await.map_err(|e| {
            warn!(code = %code, error = %e, "Store lookup failed");
            ResolveError::Unavailable(e)
        })?;

        let Some(record) = record else {
            trace!(code = %code, "Short code not found");
            return Err(ResolveError::NotFound);
        };

        let now = Timestamp::now();
        if record.is_expired_at(now) {
            self.purge_expired(code).await;
            return Err(ResolveError::NotFound);
        }

        match self.cache.policy().ttl_for(&record, now) {
            Some(ttl) => {
                debug!(code = %code, ttl_secs = ttl.as_secs(), "Populating cache from store");
                self.cache.set(code.as_str(), &record.target_url, ttl).await;
            }
            None => debug!(code = %code, "Mapping expires too soon to cache"),
        }

        self.notify(code, source);
        Ok(Resolution {
            target_url: record.target_url,
            served_from: ServedFrom::Store,
        })
    }
}
