//! Retry policy for upstream requests
//!
//! Exponential backoff with a cap. Which errors are worth retrying is
//! decided by [`FetchError::is_retryable`].

use std::future::Future;
use std::time::Duration;

use feelsat_common::config::RetryConfig;
use tracing::warn;

use super::FetchError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.multiplier.max(1.0),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before the attempt following `attempt` (1-based), or `None`
    /// once the attempt budget is spent
    pub fn backoff_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_backoff.as_secs_f64());

        Some(Duration::from_secs_f64(capped.max(0.0)))
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent. The closure receives the 1-based
    /// attempt number.
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => match self.backoff_after(attempt) {
                    Some(delay) => {
                        warn!(
                            attempt,
                            max_attempts = self.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "{} failed, retrying",
                            what
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }
}
