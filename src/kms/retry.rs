//! Bounded exponential backoff for custodian calls
//!
//! Only transient failures are retried. Throttling that persists past the
//! attempt ceiling is surfaced to the caller.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use super::custodian::CustodianError;

/// How many times, and how patiently, to retry a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first call (at least 1)
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries immediately (useful in tests)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, CustodianError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CustodianError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient custodian failure, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
