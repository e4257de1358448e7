use hotlink_core::StorageError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

/// Bounded exponential backoff for store writes.
///
/// Attempt `n` (1-based) that fails with a transient error waits
/// `initial_backoff * 2^(n-1)`, capped at `max_backoff`, plus up to 25%
/// random jitter when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    #[builder(default = 3)]
    pub max_attempts: u32,
    #[builder(default = Duration::from_millis(2000))]
    pub initial_backoff: Duration,
    #[builder(default = Duration::from_secs(60))]
    pub max_backoff: Duration,
    #[builder(default = true)]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Policy for counter batches: more attempts than the default.
    pub fn batch() -> Self {
        Self::builder().max_attempts(5).build()
    }

    /// Delay after the `attempt`-th failure, before jitter.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff(attempt);
        if !self.jitter {
            return base;
        }
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let jitter_ms = rand::rng().random_range(0..=base_ms / 4);
        base + Duration::from_millis(jitter_ms)
    }
}

/// Runs `operation` until it succeeds, fails permanently, or runs out of attempts.
///
/// Only errors for which [`StorageError::is_transient`] holds are retried.
pub async fn with_retry<T, F, Fut>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if !e.is_transient() {
                    debug!(operation = operation_name, error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}
