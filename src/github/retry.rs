//! Exponential backoff for GitHub calls.
//!
//! Transient failures (5xx, rate limits, network) are retried; permanent
//! ones are returned on first sight.

use std::future::Future;
use std::time::Duration;

use super::error::GitHubApiError;

/// How many times, and how patiently, a transient failure is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry. Doubles for each retry after that.
    pub base_delay: Duration,
}

impl RetryConfig {
    /// 3 retries, waiting 2s, 4s and 8s.
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        base_delay: Duration::from_secs(2),
    };

    /// A single attempt.
    pub const NONE: Self = Self {
        max_retries: 0,
        base_delay: Duration::ZERO,
    };

    /// Wait before retry number `retry` (0-based).
    pub fn delay_before(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Runs `operation` until it succeeds, fails permanently or runs out of retries.
///
/// The last error is returned when retries run out.
pub async fn retry_with_backoff<T, F, Fut>(
    config: RetryConfig,
    mut operation: F,
) -> Result<T, GitHubApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GitHubApiError>>,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.kind.is_retriable() => return Err(e),
            Err(e) if retry >= config.max_retries => {
                if config.max_retries > 0 {
                    tracing::warn!(attempts = retry + 1, error = %e, "GitHub call failed after retries");
                }
                return Err(e);
            }
            Err(e) => {
                let delay = config.delay_before(retry);
                tracing::debug!(retry = retry + 1, ?delay, error = %e, "Retrying GitHub call");
                tokio::time::sleep(delay).await;
                retry += 1;
            }
        }
    }
}
