use async_trait::async_trait;
use dashmap::DashMap;
use hotlink_core::store::Result;
use hotlink_core::{
    AccessEvent, AccessLog, ClickDelta, CounterStore, MappingRecord, MappingStore, ShortCode,
    StorageError,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// Access events kept per code when no capacity is given.
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// An in-memory store backed by [`DashMap`].
///
/// Cloning is cheap and clones share the same data. Used for tests and
/// single-process deployments without a database.
///
/// The access log keeps only the newest events of each code, up to the
/// event capacity. Access counts still cover every appended event.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    mappings: Arc<DashMap<String, MappingRecord>>,
    events: Arc<DashMap<String, EventLog>>,
    event_capacity: usize,
}

#[derive(Debug, Default)]
struct EventLog {
    total: u64,
    recent: VecDeque<AccessEvent>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Keeps at most `capacity` events per code, dropping the oldest.
    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            mappings: Arc::default(),
            events: Arc::default(),
            event_capacity: capacity.max(1),
        }
    }

    /// Number of stored mappings.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MappingStore for InMemoryStore {
    async fn find_by_key(&self, code: &ShortCode) -> Result<Option<MappingRecord>> {
        trace!(code = %code, "Looking up mapping in memory");
        Ok(self
            .mappings
            .get(code.as_str())
            .map(|entry| entry.value().clone()))
    }

    async fn create_mapping(&self, record: MappingRecord) -> Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.mappings.entry(record.code.as_str().to_string()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(record.code.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn delete_mapping(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.mappings.remove(code.as_str()).is_some())
    }

    async fn most_accessed(&self, limit: usize) -> Result<Vec<MappingRecord>> {
        let mut records: Vec<MappingRecord> = self
            .mappings
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| {
            b.access_count
                .cmp(&a.access_count)
                .then_with(|| a.code.cmp(&b.code))
        });
        records.truncate(limit);
        Ok(records)
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn batch_increment_counters(&self, deltas: &[ClickDelta]) -> Result<()> {
        for delta in deltas {
            if let Some(mut record) = self.mappings.get_mut(delta.code.as_str()) {
                record.access_count = record.access_count.saturating_add(delta.count);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AccessLog for InMemoryStore {
    async fn append_access(&self, event: &AccessEvent) -> Result<()> {
        let mut log = self
            .events
            .entry(event.code.as_str().to_string())
            .or_default();
        log.total += 1;
        if log.recent.len() == self.event_capacity {
            log.recent.pop_front();
        }
        log.recent.push_back(event.clone());
        Ok(())
    }

    async fn access_count(&self, code: &ShortCode) -> Result<u64> {
        Ok(self.events.get(code.as_str()).map_or(0, |log| log.total))
    }

    async fn recent_accesses(&self, code: &ShortCode, limit: usize) -> Result<Vec<AccessEvent>> {
        Ok(self
            .events
            .get(code.as_str())
            .map(|log| log.recent.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(value: &str) -> ShortCode {
        ShortCode::new_unchecked(value)
    }

    #[tokio::test]
    async fn create_and_find() {
        let store = InMemoryStore::new();
        let record = MappingRecord::new(code("abc"), "https://x.com", None);
        store.create_mapping(record.clone()).await.unwrap();

        let found = store.find_by_key(&code("abc")).await.unwrap().unwrap();
        assert_eq!(found, record);
        assert!(store.find_by_key(&code("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_conflicts_on_existing_code() {
        let store = InMemoryStore::new();
        store
            .create_mapping(MappingRecord::new(code("abc"), "https://one.com", None))
            .await
            .unwrap();

        let err = store
            .create_mapping(MappingRecord::new(code("abc"), "https://two.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        let found = store.find_by_key(&code("abc")).await.unwrap().unwrap();
        assert_eq!(found.target_url, "https://one.com");
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = InMemoryStore::new();
        store
            .create_mapping(MappingRecord::new(code("abc"), "https://x.com", None))
            .await
            .unwrap();

        assert!(store.delete_mapping(&code("abc")).await.unwrap());
        assert!(!store.delete_mapping(&code("abc")).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn batch_increment_skips_missing_codes() {
        let store = InMemoryStore::new();
        store
            .create_mapping(MappingRecord::new(code("abc"), "https://x.com", None))
            .await
            .unwrap();

        store
            .batch_increment_counters(&[ClickDelta::new("abc", 5), ClickDelta::new("gone", 3)])
            .await
            .unwrap();
        store
            .batch_increment_counters(&[ClickDelta::new("abc", 2)])
            .await
            .unwrap();

        let found = store.find_by_key(&code("abc")).await.unwrap().unwrap();
        assert_eq!(found.access_count, 7);
        assert!(store.find_by_key(&code("gone")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn most_accessed_orders_by_counter() {
        let store = InMemoryStore::new();
        for (name, count) in [("low", 1), ("high", 100), ("mid", 10)] {
            let mut record = MappingRecord::new(code(name), "https://x.com", None);
            record.access_count = count;
            store.create_mapping(record).await.unwrap();
        }

        let top: Vec<String> = store
            .most_accessed(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.code.to_string())
            .collect();
        assert_eq!(top, vec!["high", "mid"]);
    }

    #[tokio::test]
    async fn access_log_newest_first() {
        let store = InMemoryStore::new();
        for source in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            store
                .append_access(&AccessEvent::now(code("abc"), source))
                .await
                .unwrap();
        }

        assert_eq!(store.access_count(&code("abc")).await.unwrap(), 3);
        assert_eq!(store.access_count(&code("other")).await.unwrap(), 0);

        let recent = store.recent_accesses(&code("abc"), 2).await.unwrap();
        let sources: Vec<&str> = recent.iter().map(|e| e.source.as_str()).collect();
        assert_eq!(sources, vec!["10.0.0.3", "10.0.0.2"]);
    }

    #[tokio::test]
    async fn access_log_survives_mapping_deletion() {
        let store = InMemoryStore::new();
        store
            .create_mapping(MappingRecord::new(code("abc"), "https://x.com", None))
            .await
            .unwrap();
        store
            .append_access(&AccessEvent::now(code("abc"), "unknown"))
            .await
            .unwrap();

        store.delete_mapping(&code("abc")).await.unwrap();
        assert_eq!(store.access_count(&code("abc")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn access_log_keeps_newest_events_within_capacity() {
        let store = InMemoryStore::with_event_capacity(3);
        for i in 1..=5 {
            store
                .append_access(&AccessEvent::now(code("abc"), format!("10.0.0.{i}")))
                .await
                .unwrap();
        }

        assert_eq!(store.access_count(&code("abc")).await.unwrap(), 5);

        let recent = store.recent_accesses(&code("abc"), 10).await.unwrap();
        let sources: Vec<&str> = recent.iter().map(|e| e.source.as_str()).collect();
        assert_eq!(sources, vec!["10.0.0.5", "10.0.0.4", "10.0.0.3"]);
    }
}
