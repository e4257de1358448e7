//! Durable store implementations for mappings, counters and the access log.

pub mod memory;
pub mod mysql;

pub use hotlink_core::store::Result;
pub use hotlink_core::{AccessLog, CounterStore, MappingStore, StorageError};
pub use memory::InMemoryStore;
pub use mysql::MySqlStore;
