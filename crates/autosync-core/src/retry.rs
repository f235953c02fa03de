use std::{fmt::Display, future::Future, time::Duration};

use backon::Retryable;
use tracing::warn;

/// Bounded-attempt exponential backoff for transient store faults.
///
/// Attempt `n` (1-based) that fails transiently is followed by a sleep of
/// `min(max_delay, base_delay * 2^(n-1))`. The error of the last attempt is returned as is.
///
/// Only wrap idempotent reads with this: the delta export and parity check must never go through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

    /// `max_attempts` below one is treated as one. `max_delay` caps every sleep, including the
    /// first when it is below `base_delay`.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// A policy that never retries.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep after the failed `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Run `op`, retrying while `is_transient` holds and attempts remain.
    pub async fn run<T, E, F, Fut, P>(&self, op: F, mut is_transient: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(&E) -> bool,
        E: Display,
    {
        let policy = *self;
        let backoff = (1..self.max_attempts).map(move |attempt| policy.delay_for(attempt));

        op.retry(backoff)
            .sleep(tokio::time::sleep)
            .when(|e| is_transient(e))
            .notify(|e, delay| {
                warn!(
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "transient store error, retrying"
                );
            })
            .await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_MAX_ATTEMPTS,
            Self::DEFAULT_BASE_DELAY,
            Self::DEFAULT_MAX_DELAY,
        )
    }
}
