//! Retry with exponential backoff
//!
//! Transient failures (timeouts, throttling, 5xx) are retried after
//! `base_delay * 2^attempt`; terminal ones (record not found, auth) are
//! returned on first sight. Errors come back unchanged.

use std::future::Future;
use std::time::Duration;

use log::debug;

use crate::error::FetchError;

/// Retry settings shared by every fetch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero means exactly one attempt.
    pub max_retries: u32,
    /// Wait before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A single attempt, no retries.
    #[cfg(test)]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Backoff before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        with_retry(operation, self.max_retries, self.base_delay).await
    }
}

/// Run `operation`, retrying transient failures up to `max_retries` times.
pub async fn with_retry<T, F, Fut>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let policy = RetryPolicy::new(max_retries, base_delay);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_terminal() => {
                debug!("Terminal error, not retrying: {}", err);
                return Err(err);
            }
            Err(err) if attempt >= max_retries => {
                debug!("Giving up after {} attempts: {}", attempt + 1, err);
                return Err(err);
            }
            Err(err) => {
                let backoff = policy.delay_for(attempt);
                // Honour a longer server hint on 429s
                let delay = err.retry_after().map_or(backoff, |hint| hint.max(backoff));
                debug!(
                    "Attempt {} failed ({}), retrying in {:?}",
                    attempt + 1,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
