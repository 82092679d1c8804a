//! Database Retry Logic
//!
//! Exponential backoff for transient SQLite lock errors. Several workers share
//! one cache file, so a writer can find the database locked by another
//! worker's batch; those errors are retried, anything else is returned as-is.

use std::time::{Duration, Instant};
use traitscore_common::Result;

/// Retry schedule for lock contention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRetry {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure
    pub initial_backoff: Duration,
}

impl Default for LockRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// Retry a database operation while it fails with lock contention.
///
/// **Algorithm:**
/// 1. Attempt operation
/// 2. If successful, return result
/// 3. If lock error and attempts remain: log WARN, sleep backoff, double it, retry
/// 4. If lock error on the last attempt: log ERROR, return the error
/// 5. If other error: return error immediately (no retry)
///
/// With the default schedule the sleeps are 0.5s, 1s, 2s, 4s.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    schedule: LockRetry,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let max_attempts = schedule.max_attempts.max(1);
    let mut backoff = schedule.initial_backoff;
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_lock_contention() {
                    return Err(err);
                }

                if attempt >= max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation failed: still locked after final attempt"
                    );
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Database locked, will retry after backoff"
                );

                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
        }
    }
}
