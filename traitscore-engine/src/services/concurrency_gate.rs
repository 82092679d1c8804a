//! Bounded in-flight gate for remote calls

use crate::error::ScoringError;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Counting gate: at most `limit` holders of a permit at once
///
/// The gate bounds parallelism; the rate limiter bounds throughput.
pub struct ConcurrencyGate {
    semaphore: Semaphore,
    limit: usize,
}

impl ConcurrencyGate {
    /// `limit` of zero is treated as one
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Semaphore::new(limit),
            limit,
        }
    }

    /// Wait for a permit; the call slot is released when the permit drops
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, ScoringError> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| ScoringError::GateClosed)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits currently held
    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }
}
