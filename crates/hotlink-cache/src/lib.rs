//! Cache backends and the fail-soft cache layer used on the read path.

pub mod backend;
pub mod layer;
pub mod moka;
pub mod policy;
pub mod redis;

pub use backend::{CacheBackend, Result};
pub use hotlink_core::CacheError;
pub use layer::CacheLayer;
pub use moka::MokaCacheBackend;
pub use policy::TtlPolicy;
pub use redis::RedisCacheBackend;
