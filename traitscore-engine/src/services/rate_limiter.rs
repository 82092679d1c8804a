//! Sliding-window requests-per-minute limiter
//!
//! One limiter per worker: each worker holds its own API key, so quotas are
//! never pooled across workers.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Width of the sliding window
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Slack added when waiting for the oldest request to leave the window
const SAFETY_MARGIN: Duration = Duration::from_millis(10);

/// RPM limiter over a trailing 60 second window
///
/// Holds the acquisition times of at most `rpm` recent requests. A caller that
/// finds the window full sleeps until the oldest entry expires, without
/// holding the lock, then checks again.
pub struct RateLimiter {
    rpm: usize,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// `rpm` of zero is treated as one
    pub fn new(rpm: usize) -> Self {
        let rpm = rpm.max(1);
        Self {
            rpm,
            timestamps: Mutex::new(VecDeque::with_capacity(rpm)),
        }
    }

    pub fn rpm(&self) -> usize {
        self.rpm
    }

    /// Wait for a request slot and claim it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock().await;
                let now = Instant::now();
                prune(&mut timestamps, now);

                if timestamps.len() < self.rpm {
                    timestamps.push_back(now);
                    return;
                }

                match timestamps.front() {
                    Some(oldest) => {
                        (*oldest + RATE_WINDOW + SAFETY_MARGIN).saturating_duration_since(now)
                    }
                    None => Duration::ZERO,
                }
            };

            tracing::debug!(
                rpm = self.rpm,
                wait_ms = wait.as_millis() as u64,
                "Rate window full, waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests currently counted in the window
    pub async fn in_window(&self) -> usize {
        let mut timestamps = self.timestamps.lock().await;
        prune(&mut timestamps, Instant::now());
        timestamps.len()
    }
}

/// Drop entries that are 60 seconds old or older
fn prune(timestamps: &mut VecDeque<Instant>, now: Instant) {
    while let Some(oldest) = timestamps.front() {
        if now.duration_since(*oldest) >= RATE_WINDOW {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}
