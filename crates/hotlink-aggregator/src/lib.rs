//! In-memory click aggregation with batched, retried counter flushes.
//!
//! [`AccessAggregator`] owns the pending-access buffer and the flusher task
//! that drains it; the buffer is not reachable from outside the aggregator.
//! Recording an access is a map increment. The durable write happens later
//! as one transactional batch per flush.

pub mod aggregator;
mod buffer;
pub mod retry;

pub use aggregator::{AccessAggregator, AggregatorConfig, AggregatorStats};
pub use retry::{with_retry, RetryPolicy};
