//! Retry policy for remote scoring calls
//!
//! Rate-limit failures are retried without limit: they are expected and clear
//! on their own. Every other failure gets `max_retries` attempts in total, so a
//! broken key or endpoint cannot stall a worker forever.

use crate::error::ScoringError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Longest error excerpt logged for a rate-limit hit
const RATE_LIMIT_LOG_CHARS: usize = 100;

/// Longest error excerpt logged for a retried failure
const RETRY_LOG_CHARS: usize = 150;

/// A call that failed with a non-rate-limit error on its final attempt
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempts: {error}")]
pub struct RetryExhausted {
    pub attempts: u32,
    pub error: ScoringError,
}

/// Backoff and attempt limits
///
/// `backoff(attempt) = min(base_backoff * 2^attempt, max_backoff)`; the
/// defaults give 2s, 4s, 8s, 16s, 32s, 60s, 60s, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before the retry that follows failed attempt number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }

    /// Run `call` until it succeeds or a non-rate-limit error uses up the attempts
    ///
    /// `on_rate_limit` runs once per rate-limit failure, before the backoff sleep.
    pub async fn run<T, F, Fut>(
        &self,
        mut call: F,
        mut on_rate_limit: impl FnMut(),
    ) -> Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ScoringError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let backoff = self.backoff(attempt);

            if err.is_rate_limit() {
                on_rate_limit();
                warn!(
                    attempt,
                    backoff_secs = backoff.as_secs_f64(),
                    "Rate limit hit, waiting: {}",
                    excerpt(&err, RATE_LIMIT_LOG_CHARS)
                );
                tokio::time::sleep(backoff).await;
                attempt = attempt.saturating_add(1);
                continue;
            }

            attempt = attempt.saturating_add(1);
            if attempt >= self.max_retries {
                return Err(RetryExhausted {
                    attempts: attempt,
                    error: err,
                });
            }

            warn!(
                attempt,
                max_retries = self.max_retries,
                backoff_secs = backoff.as_secs_f64(),
                "Call failed, retrying: {}",
                excerpt(&err, RETRY_LOG_CHARS)
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

fn excerpt(err: &ScoringError, max_chars: usize) -> String {
    err.to_string().chars().take(max_chars).collect()
}
