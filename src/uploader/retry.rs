//! Bounded re-execution of a single chunk request

use crate::uploader::error::{UploadError, UploadResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRY: u32 = 3;

/// Default ceiling for backoff delays, in milliseconds
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// How often and how fast a failed request is re-run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; at most `max_retry + 1` executions
    pub max_retry: u32,
    /// Zero means retries are immediate
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Retry without waiting between attempts
    pub fn immediate(max_retry: u32) -> Self {
        Self {
            max_retry,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based), with exponential backoff
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() || attempt == 0 {
            return Duration::ZERO;
        }
        let base = self.base_delay.as_millis() as u64;
        let delay_ms = base.saturating_mul(1 << (attempt - 1).min(10)); // Cap exponential growth
        Duration::from_millis(delay_ms).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            ..Self::immediate(DEFAULT_MAX_RETRY)
        }
    }
}

/// Run `op` until it succeeds or the retry budget is spent.
///
/// `op` receives the attempt number starting at 0. The last failure is
/// returned unchanged. Non-retryable errors end the loop at once.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    chunk_index: usize,
    cancel_token: &CancellationToken,
    mut op: F,
) -> UploadResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = UploadResult<T>>,
{
    let mut attempt = 0;
    loop {
        if cancel_token.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        match op(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(
                        target: "uploader::retry",
                        chunk = chunk_index,
                        attempt,
                        "Chunk succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() || attempt >= policy.max_retry => {
                error!(
                    target: "uploader::retry",
                    chunk = chunk_index,
                    error = %e,
                    attempt,
                    "Chunk upload failed"
                );
                return Err(e);
            }
            Err(e) => {
                warn!(
                    target: "uploader::retry",
                    chunk = chunk_index,
                    error = %e,
                    attempt,
                    "Chunk upload failed, will retry"
                );
            }
        }

        attempt += 1;
        let delay = policy.delay_for(attempt);
        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel_token.cancelled() => {
                    return Err(UploadError::Cancelled);
                }
            }
        }
    }
}
