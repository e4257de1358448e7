//! The read path: cache lookup, store fallback and access notification.
//!
//! [`ResolutionService`] answers "where does this short code point?" from
//! the cache when it can and from the durable store when it must, and
//! reports every successful resolution to an [`AccessNotifier`]. The
//! [`AccessDispatcher`] is the notifier used in production: it counts the
//! access in memory and queues the detail event for the access log.
//!
//! [`AccessNotifier`]: hotlink_core::AccessNotifier

pub mod dispatch;
pub mod error;
pub mod resolver;
pub mod service;
pub mod warmup;

pub use dispatch::{AccessDispatcher, DispatcherConfig};
pub use error::{ResolveError, Result};
pub use resolver::{Resolution, Resolver, ServedFrom};
pub use service::ResolutionService;
pub use warmup::CacheWarmer;
