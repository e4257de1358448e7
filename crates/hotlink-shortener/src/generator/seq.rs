use std::sync::atomic::{AtomicU64, Ordering};

use crate::generator::Generator;
use hotlink_core::ShortCode;

/// Sequential codes like `hl000000`, `hl000001`, ...
///
/// Unique within one process. Nodes sharing a store need distinct prefixes
/// or disjoint offsets.
#[derive(Debug)]
pub struct SequentialGenerator {
    counter: AtomicU64,
    prefix: String,
}

impl SequentialGenerator {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Starts counting at `offset`, e.g. to resume after a restart.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

impl Generator for SequentialGenerator {
    fn generate(&self) -> ShortCode {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        ShortCode::new_unchecked(format!("{}{:06}", self.prefix, count))
    }
}
