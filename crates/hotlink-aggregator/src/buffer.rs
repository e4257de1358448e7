use dashmap::DashMap;
use hotlink_core::ClickDelta;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// What a single [`PendingAccessBuffer::record`] call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RecordOutcome {
    /// First entry since the last drain: a flush window should start.
    pub(crate) opened_window: bool,
    /// The number of distinct keys just reached the threshold.
    pub(crate) reached_threshold: bool,
}

/// Pending counter increments, keyed by short code.
///
/// Recorders share a read guard and increment through the map's own shard
/// locks. Draining takes the write guard only long enough to swap in an
/// empty map, so every increment lands either in the drained batch or in the
/// next one.
#[derive(Debug)]
pub(crate) struct PendingAccessBuffer {
    slots: RwLock<DashMap<String, u64>>,
    armed: AtomicBool,
    saturated: AtomicBool,
    threshold: usize,
}

impl PendingAccessBuffer {
    /// `threshold` is the number of distinct keys that triggers an early flush.
    pub(crate) fn new(threshold: usize) -> Self {
        Self {
            slots: RwLock::new(DashMap::new()),
            armed: AtomicBool::new(false),
            saturated: AtomicBool::new(false),
            threshold: threshold.max(1),
        }
    }

    /// Adds one pending access for `code`.
    pub(crate) fn record(&self, code: &str) -> RecordOutcome {
        let slots = self.slots.read();

        if let Some(mut count) = slots.get_mut(code) {
            *count += 1;
        } else {
            *slots.entry(code.to_string()).or_insert(0) += 1;
        }

        let opened_window = !self.armed.swap(true, Ordering::AcqRel);
        let reached_threshold =
            slots.len() >= self.threshold && !self.saturated.swap(true, Ordering::AcqRel);

        RecordOutcome {
            opened_window,
            reached_threshold,
        }
    }

    /// Takes every pending increment, leaving the buffer empty.
    pub(crate) fn drain(&self) -> Vec<ClickDelta> {
        let taken = {
            let mut slots = self.slots.write();
            self.armed.store(false, Ordering::Release);
            self.saturated.store(false, Ordering::Release);
            std::mem::take(&mut *slots)
        };

        taken
            .into_iter()
            .map(|(code, count)| ClickDelta::new(code, count))
            .collect()
    }

    /// Number of distinct keys waiting to be flushed.
    pub(crate) fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the threshold was reached since the last drain.
    pub(crate) fn is_saturated(&self) -> bool {
        self.saturated.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn pending_for(&self, code: &str) -> u64 {
        self.slots.read().get(code).map_or(0, |count| *count)
    }
}
