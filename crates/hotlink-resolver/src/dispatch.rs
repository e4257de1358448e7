use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hotlink_core::{AccessEvent, AccessLog, AccessNotifier, AccessRecorder};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, TypedBuilder)]
pub struct DispatcherConfig {
    /// Access events waiting to be written to the access log.
    #[builder(default = 10_000)]
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Fans each access out to the in-memory counter and the access log.
///
/// The counter increment happens inline. The detail event goes through a
/// bounded queue to a worker task that appends it to the [`AccessLog`].
/// When the queue is full the new event is dropped and counted; the counter
/// increment for it has already been recorded.
pub struct AccessDispatcher {
    recorder: Arc<dyn AccessRecorder>,
    sender: mpsc::Sender<AccessEvent>,
    shutdown: Arc<Notify>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dropped: AtomicU64,
}

impl AccessDispatcher {
    /// Creates the dispatcher and spawns its worker on the current runtime.
    pub fn spawn<L: AccessLog>(
        recorder: Arc<dyn AccessRecorder>,
        log: Arc<L>,
        config: DispatcherConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let shutdown = Arc::new(Notify::new());
        let worker = tokio::spawn(run_worker(receiver, log, Arc::clone(&shutdown)));

        Self {
            recorder,
            sender,
            shutdown,
            worker: Mutex::new(Some(worker)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Detail events dropped because the queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Events currently waiting in the queue.
    pub fn queued_events(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Stops accepting events and waits up to `grace` for the queue to drain.
    pub async fn shutdown(&self, grace: Duration) {
        let Some(mut worker) = self.worker.lock().take() else {
            return;
        };
        self.shutdown.notify_one();

        match timeout(grace, &mut worker).await {
            Ok(Ok(())) => info!("Access dispatcher drained"),
            Ok(Err(e)) => warn!(error = %e, "Access dispatcher worker failed"),
            Err(_) => {
                warn!(
                    queued = self.queued_events(),
                    "Access dispatcher did not drain within the grace period"
                );
                worker.abort();
            }
        }
    }
}

impl AccessNotifier for AccessDispatcher {
    fn notify(&self, event: AccessEvent) {
        self.recorder.record_access(&event.code);

        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                // Logged at 1, 2, 4, 8, ... drops.
                if dropped.is_power_of_two() {
                    warn!(code = %event.code, dropped, "Access queue full, dropping event");
                }
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(code = %event.code, "Access dispatcher stopped, discarding event");
            }
        }
    }
}

impl Drop for AccessDispatcher {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.abort();
        }
    }
}

async fn persist<L: AccessLog>(log: &L, event: AccessEvent) {
    if let Err(e) = log.append_access(&event).await {
        warn!(code = %event.code, error = %e, "Failed to append access event");
    }
}

async fn run_worker<L: AccessLog>(
    mut receiver: mpsc::Receiver<AccessEvent>,
    log: Arc<L>,
    shutdown: Arc<Notify>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            event = receiver.recv() => match event {
                Some(event) => persist(log.as_ref(), event).await,
                None => return,
            },
        }
    }

    receiver.close();
    let mut drained = 0usize;
    while let Some(event) = receiver.recv().await {
        persist(log.as_ref(), event).await;
        drained += 1;
    }
    debug!(drained, "Access queue drained");
}
