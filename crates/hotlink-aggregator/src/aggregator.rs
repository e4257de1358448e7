use hotlink_core::{AccessRecorder, ClickDelta, CounterStore, ShortCode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, trace, warn};
use typed_builder::TypedBuilder;

use crate::buffer::PendingAccessBuffer;
use crate::retry::{with_retry, RetryPolicy};

/// Tuning knobs for [`AccessAggregator`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct AggregatorConfig {
    /// How long the first buffered access waits before its batch is flushed.
    #[builder(default = Duration::from_millis(1000))]
    pub flush_window: Duration,
    /// Distinct keys that trigger a flush before the window ends.
    #[builder(default = 50)]
    pub flush_threshold: usize,
    /// Batches being written concurrently.
    #[builder(default = 5)]
    pub max_in_flight: usize,
    #[builder(default = RetryPolicy::batch())]
    pub retry: RetryPolicy,
    /// Upper bound for the final flush in [`AccessAggregator::stop`].
    #[builder(default = Duration::from_secs(10))]
    pub shutdown_grace: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Counters describing what the aggregator has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub flushed_batches: u64,
    pub flushed_accesses: u64,
    pub dropped_batches: u64,
    pub dropped_accesses: u64,
    pub retries: u64,
    /// Distinct keys currently buffered.
    pub pending_keys: usize,
}

#[derive(Debug, Default)]
struct StatCounters {
    flushed_batches: AtomicU64,
    flushed_accesses: AtomicU64,
    dropped_batches: AtomicU64,
    dropped_accesses: AtomicU64,
    retries: AtomicU64,
}

struct Shared<C> {
    store: Arc<C>,
    buffer: PendingAccessBuffer,
    config: AggregatorConfig,
    window_opened: Notify,
    threshold_reached: Notify,
    shutdown: Notify,
    in_flight: Arc<Semaphore>,
    stats: StatCounters,
}

/// Buffers access counts in memory and flushes them as batched increments.
///
/// A flush happens when the window opened by the first buffered access
/// ends, or earlier once the number of distinct buffered keys reaches the
/// threshold. Each flush is one [`CounterStore::batch_increment_counters`]
/// call, retried on transient errors and dropped once retries run out.
///
/// The flusher runs in a background task started by [`start`](Self::start)
/// and stopped by [`stop`](Self::stop), which also flushes what is left.
pub struct AccessAggregator<C> {
    shared: Arc<Shared<C>>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl<C: CounterStore> AccessAggregator<C> {
    pub fn new(store: Arc<C>, config: AggregatorConfig) -> Self {
        let shared = Shared {
            store,
            buffer: PendingAccessBuffer::new(config.flush_threshold),
            in_flight: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            config,
            window_opened: Notify::new(),
            threshold_reached: Notify::new(),
            shutdown: Notify::new(),
            stats: StatCounters::default(),
        };
        Self {
            shared: Arc::new(shared),
            flusher: Mutex::new(None),
        }
    }

    /// Spawns the flusher task. Calling it again while running does nothing.
    pub fn start(&self) {
        let mut flusher = self.flusher.lock();
        if flusher.is_some() {
            warn!("Access aggregator already started");
            return;
        }
        let shared = Arc::clone(&self.shared);
        *flusher = Some(tokio::spawn(run_flusher(shared)));
        info!(
            window_ms = self.shared.config.flush_window.as_millis() as u64,
            threshold = self.shared.config.flush_threshold,
            "Access aggregator started"
        );
    }

    /// Buffers one access for `code`. Never waits on I/O.
    pub fn record(&self, code: &str) {
        let outcome = self.shared.buffer.record(code);
        if outcome.opened_window {
            self.shared.window_opened.notify_one();
        }
        if outcome.reached_threshold {
            self.shared.threshold_reached.notify_one();
        }
    }

    /// Drains the buffer and writes it now, returning once the batch has
    /// been committed or dropped.
    pub async fn flush_now(&self) {
        let batch = self.shared.buffer.drain();
        if batch.is_empty() {
            trace!("Nothing to flush");
            return;
        }
        let Ok(permit) = Arc::clone(&self.shared.in_flight).acquire_owned().await else {
            return;
        };
        write_batch(Arc::clone(&self.shared), batch, permit).await;
    }

    /// Stops the flusher and makes a last flush, waiting at most `grace`.
    pub async fn stop(&self, grace: Duration) {
        let handle = self.flusher.lock().take();
        let Some(mut handle) = handle else {
            if timeout(grace, self.flush_now()).await.is_err() {
                warn!("Final access flush did not finish within the grace period");
            }
            return;
        };

        self.shared.shutdown.notify_one();
        match timeout(grace, &mut handle).await {
            Ok(Ok(())) => info!("Access aggregator stopped"),
            Ok(Err(e)) => error!(error = %e, "Access aggregator flusher failed"),
            Err(_) => {
                warn!(
                    pending_keys = self.shared.buffer.len(),
                    "Access aggregator did not stop within the grace period"
                );
                handle.abort();
            }
        }
    }

    /// Stops with the configured shutdown grace period.
    pub async fn shutdown(&self) {
        self.stop(self.shared.config.shutdown_grace).await;
    }

    pub fn stats(&self) -> AggregatorStats {
        let stats = &self.shared.stats;
        AggregatorStats {
            flushed_batches: stats.flushed_batches.load(Ordering::Relaxed),
            flushed_accesses: stats.flushed_accesses.load(Ordering::Relaxed),
            dropped_batches: stats.dropped_batches.load(Ordering::Relaxed),
            dropped_accesses: stats.dropped_accesses.load(Ordering::Relaxed),
            retries: stats.retries.load(Ordering::Relaxed),
            pending_keys: self.shared.buffer.len(),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.shared.config
    }
}

impl<C: CounterStore> AccessRecorder for AccessAggregator<C> {
    fn record_access(&self, code: &ShortCode) {
        self.record(code.as_str());
    }
}

impl<C> Drop for AccessAggregator<C> {
    fn drop(&mut self) {
        if let Some(handle) = self.flusher.get_mut().take() {
            handle.abort();
        }
    }
}

/// Waits for a threshold signal that still holds. A signal left over from a
/// batch that the window already flushed is ignored.
async fn threshold_reached<C>(shared: &Shared<C>) {
    loop {
        shared.threshold_reached.notified().await;
        if shared.buffer.is_saturated() {
            return;
        }
    }
}

async fn run_flusher<C: CounterStore>(shared: Arc<Shared<C>>) {
    let mut writes = JoinSet::new();

    loop {
        tokio::select! {
            _ = shared.shutdown.notified() => break,
            _ = shared.window_opened.notified() => {}
        }
        while writes.try_join_next().is_some() {}

        // A wake-up left over from a window that an external flush already
        // drained. The next record opens a fresh window.
        if shared.buffer.is_empty() {
            trace!("Window signal with nothing buffered");
            continue;
        }

        let deadline = Instant::now() + shared.config.flush_window;
        let stopping = tokio::select! {
            _ = shared.shutdown.notified() => true,
            _ = threshold_reached(&shared) => {
                debug!(threshold = shared.config.flush_threshold, "Flush threshold reached");
                false
            }
            _ = sleep_until(deadline) => false,
        };

        let batch = shared.buffer.drain();
        if !batch.is_empty() {
            let Ok(permit) = Arc::clone(&shared.in_flight).acquire_owned().await else {
                break;
            };
            writes.spawn(write_batch(Arc::clone(&shared), batch, permit));
        }

        if stopping {
            break;
        }
    }

    let batch = shared.buffer.drain();
    if !batch.is_empty() {
        debug!(entries = batch.len(), "Final flush of pending accesses");
        if let Ok(permit) = Arc::clone(&shared.in_flight).acquire_owned().await {
            writes.spawn(write_batch(Arc::clone(&shared), batch, permit));
        }
    }
    while writes.join_next().await.is_some() {}
}

async fn write_batch<C: CounterStore>(
    shared: Arc<Shared<C>>,
    batch: Vec<ClickDelta>,
    _permit: OwnedSemaphorePermit,
) {
    let accesses: u64 = batch.iter().map(|delta| delta.count).sum();
    let attempts = AtomicU64::new(0);
    trace!(entries = batch.len(), accesses, "Writing counter batch");

    let result = with_retry("batch_increment_counters", &shared.config.retry, || {
        attempts.fetch_add(1, Ordering::Relaxed);
        shared.store.batch_increment_counters(&batch)
    })
    .await;

    let retries = attempts.load(Ordering::Relaxed).saturating_sub(1);
    shared.stats.retries.fetch_add(retries, Ordering::Relaxed);

    match result {
        Ok(()) => {
            shared.stats.flushed_batches.fetch_add(1, Ordering::Relaxed);
            shared
                .stats
                .flushed_accesses
                .fetch_add(accesses, Ordering::Relaxed);
            debug!(entries = batch.len(), accesses, "Flushed counter batch");
        }
        Err(e) => {
            shared.stats.dropped_batches.fetch_add(1, Ordering::Relaxed);
            shared
                .stats
                .dropped_accesses
                .fetch_add(accesses, Ordering::Relaxed);
            error!(
                entries = batch.len(),
                accesses,
                error = %e,
                "Dropping counter batch after failed flush"
            );
        }
    }
}
