//! Disposable MySQL and Redis servers for integration tests.
//!
//! Every fixture starts a container through `testcontainers`, so tests using
//! this crate need a reachable Docker daemon.

pub mod error;
pub mod mysql;
pub mod redis;

pub use error::{Result, TestInfraError};
pub use mysql::{MySqlConfig, MySqlServer};
pub use redis::RedisServer;
