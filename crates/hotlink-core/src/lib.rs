//! Core types and traits for the Hotlink short link resolver.
//!
//! This crate holds the contracts shared by the cache layer, the durable
//! stores, the access aggregator and the resolution service.

pub mod error;
pub mod mapping;
pub mod notify;
pub mod shortcode;
pub mod shortener;
pub mod store;

pub use error::{CacheError, ShortenerError, StorageError};
pub use mapping::{AccessEvent, ClickDelta, MappingAnalytics, MappingInfo, MappingRecord};
pub use notify::{AccessNotifier, AccessRecorder};
pub use shortcode::ShortCode;
pub use shortener::{ExpirationPolicy, ShortenParams, Shortener};
pub use store::{AccessLog, CounterStore, MappingStore};
