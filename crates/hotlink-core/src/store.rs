use crate::error::StorageError;
use crate::mapping::{AccessEvent, ClickDelta, MappingRecord};
use crate::shortcode::ShortCode;
use async_trait::async_trait;

/// Result type for durable store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// The durable source of truth for mappings.
#[async_trait]
pub trait MappingStore: Send + Sync + 'static {
    /// Retrieves the mapping for a given short code, expired or not.
    ///
    /// Expiration is the caller's decision; stores return the row as-is.
    async fn find_by_key(&self, code: &ShortCode) -> Result<Option<MappingRecord>>;

    /// Inserts a new mapping. Returns `Err(Conflict)` if the code already exists.
    async fn create_mapping(&self, record: MappingRecord) -> Result<()>;

    /// Deletes the mapping for a given short code.
    /// Returns `true` if the mapping existed and was removed.
    async fn delete_mapping(&self, code: &ShortCode) -> Result<bool>;

    /// Returns up to `limit` mappings ordered by access counter, highest first.
    async fn most_accessed(&self, limit: usize) -> Result<Vec<MappingRecord>>;
}

/// Counter updates for mappings.
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    /// Applies all deltas in a single all-or-nothing transaction.
    ///
    /// Deltas for codes that no longer exist are ignored.
    async fn batch_increment_counters(&self, deltas: &[ClickDelta]) -> Result<()>;
}

/// Append-only log of individual access events.
#[async_trait]
pub trait AccessLog: Send + Sync + 'static {
    async fn append_access(&self, event: &AccessEvent) -> Result<()>;

    /// Number of events recorded for `code`.
    async fn access_count(&self, code: &ShortCode) -> Result<u64>;

    /// The latest `limit` events for `code`, newest first.
    async fn recent_accesses(&self, code: &ShortCode, limit: usize) -> Result<Vec<AccessEvent>>;
}
