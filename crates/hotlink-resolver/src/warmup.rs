use std::sync::Arc;

use hotlink_cache::CacheLayer;
use hotlink_core::MappingStore;
use jiff::Timestamp;
use tracing::{debug, info, warn};

/// Preloads the most accessed mappings into the cache.
pub struct CacheWarmer<S> {
    store: Arc<S>,
    cache: CacheLayer,
}

impl<S: MappingStore> CacheWarmer<S> {
    pub fn new(store: Arc<S>, cache: CacheLayer) -> Self {
        Self { store, cache }
    }

    /// Caches up to `limit` of the most accessed mappings that are not
    /// already cached. Returns how many entries were written.
    ///
    /// Expired mappings are skipped. Store failures are logged and end the
    /// warm-up early; they are never fatal.
    pub async fn warm(&self, limit: usize) -> usize {
        let records = match self.store.most_accessed(limit).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Cache warm-up skipped, store unavailable");
                return 0;
            }
        };

        let now = Timestamp::now();
        let live: Vec<_> = records
            .into_iter()
            .filter(|record| !record.is_expired_at(now))
            .collect();
        let keys: Vec<String> = live.iter().map(|r| r.code.to_string()).collect();
        let cached = self.cache.multi_get(&keys).await;

        let mut warmed = 0;
        for (record, existing) in live.iter().zip(cached) {
            if existing.is_some() {
                continue;
            }
            if self.cache.populate(record).await {
                warmed += 1;
            } else {
                debug!(code = %record.code, "Skipping mapping that expires too soon");
            }
        }

        info!(warmed, candidates = live.len(), "Cache warm-up finished");
        warmed
    }
}
