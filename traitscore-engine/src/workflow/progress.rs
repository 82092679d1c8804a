//! Scoring progress counters
//!
//! Workers bump atomic counters; a reporter reads [`ProgressSnapshot`]s at
//! any time. Counters only grow and each is updated atomically on its own;
//! a snapshot is not a consistent cut across counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Counters owned by one worker
#[derive(Debug, Default)]
pub struct WorkerProgress {
    completed: AtomicU64,
    total: AtomicU64,
    rate_limits: AtomicU64,
    errors: AtomicU64,
}

impl WorkerProgress {
    pub fn record_rate_limit(&self) {
        self.rate_limits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn rate_limits(&self) -> u64 {
        self.rate_limits.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    fn snapshot(&self, worker_id: u32) -> WorkerSnapshot {
        WorkerSnapshot {
            worker_id,
            completed: self.completed.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            rate_limits: self.rate_limits.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Process-wide progress shared by every worker of a run
#[derive(Debug)]
pub struct ProgressTracker {
    completed: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    workers: RwLock<BTreeMap<u32, Arc<WorkerProgress>>>,
    started_at: DateTime<Utc>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            completed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            workers: RwLock::new(BTreeMap::new()),
            started_at: Utc::now(),
        }
    }

    /// Start (or restart) a worker's counters at zero of `total` posts
    pub fn register_worker(&self, worker_id: u32, total: usize) -> Arc<WorkerProgress> {
        let progress = Arc::new(WorkerProgress {
            total: AtomicU64::new(total as u64),
            ..Default::default()
        });
        self.workers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(worker_id, progress.clone());
        progress
    }

    /// Fold one finished batch into the shared counters
    pub fn record_batch(&self, worker: &WorkerProgress, posts: usize, hits: u64, misses: u64) {
        let posts = posts as u64;
        self.completed.fetch_add(posts, Ordering::Relaxed);
        self.cache_hits.fetch_add(hits, Ordering::Relaxed);
        self.cache_misses.fetch_add(misses, Ordering::Relaxed);
        worker.completed.fetch_add(posts, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let workers = self
            .workers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(id, progress)| progress.snapshot(*id))
            .collect();

        ProgressSnapshot {
            taken_at: Utc::now(),
            started_at: self.started_at,
            completed: self.completed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            workers,
        }
    }
}

/// Per-worker counters at snapshot time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub worker_id: u32,
    pub completed: u64,
    pub total: u64,
    pub rate_limits: u64,
    pub errors: u64,
}

/// Read-only view of the counters for reporters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub taken_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub completed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub workers: Vec<WorkerSnapshot>,
}

impl ProgressSnapshot {
    /// Posts assigned across all registered workers
    pub fn total(&self) -> u64 {
        self.workers.iter().map(|w| w.total).sum()
    }

    pub fn rate_limits(&self) -> u64 {
        self.workers.iter().map(|w| w.rate_limits).sum()
    }

    pub fn errors(&self) -> u64 {
        self.workers.iter().map(|w| w.errors).sum()
    }

    /// Fraction of pair lookups answered from cache (0.0 when none yet)
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }

    pub fn display_string(&self) -> String {
        let total = self.total();
        let percentage = if total == 0 {
            0.0
        } else {
            self.completed as f64 / total as f64 * 100.0
        };
        format!(
            "{}/{} posts ({:.1}%) | cache {} hits, {} misses ({:.0}% hit) | {} rate limits | {} errors",
            self.completed,
            total,
            percentage,
            self.cache_hits,
            self.cache_misses,
            self.hit_rate() * 100.0,
            self.rate_limits(),
            self.errors()
        )
    }
}

/// Log a progress line every `interval` until `cancel` fires
///
/// Lines are only emitted when the completed count moved.
pub fn spawn_progress_reporter(
    tracker: Arc<ProgressTracker>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_completed = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let snapshot = tracker.snapshot();
            if snapshot.completed > last_completed {
                let elapsed = (snapshot.taken_at - snapshot.started_at)
                    .num_milliseconds()
                    .max(1) as f64
                    / 1000.0;
                info!(
                    rate_per_sec = %format!("{:.2}", snapshot.completed as f64 / elapsed),
                    "Scoring progress: {}",
                    snapshot.display_string()
                );
                last_completed = snapshot.completed;
            }
        }

        tracing::debug!("Progress reporter stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_initializes_counters() {
        let tracker = ProgressTracker::new();
        tracker.register_worker(0, 40);
        tracker.register_worker(1, 35);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.total(), 75);
        assert_eq!(
            snapshot.workers[1],
            WorkerSnapshot {
                worker_id: 1,
                completed: 0,
                total: 35,
                rate_limits: 0,
                errors: 0,
            }
        );
    }

    #[test]
    fn test_batches_accumulate() {
        let tracker = ProgressTracker::new();
        let w0 = tracker.register_worker(0, 4);
        let w1 = tracker.register_worker(1, 4);

        tracker.record_batch(&w0, 2, 3, 1);
        tracker.record_batch(&w1, 2, 0, 4);
        tracker.record_batch(&w0, 2, 4, 0);
        w1.record_rate_limit();
        w1.record_error();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.completed, 6);
        assert_eq!(snapshot.cache_hits, 7);
        assert_eq!(snapshot.cache_misses, 5);
        assert_eq!(snapshot.workers[0].completed, 4);
        assert_eq!(snapshot.rate_limits(), 1);
        assert_eq!(snapshot.errors(), 1);
    }

    #[test]
    fn test_concurrent_updates_not_lost() {
        let tracker = Arc::new(ProgressTracker::new());
        let worker = tracker.register_worker(0, 8000);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                let worker = worker.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        tracker.record_batch(&worker, 1, 1, 0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.completed, 8000);
        assert_eq!(snapshot.cache_hits, 8000);
        assert_eq!(snapshot.workers[0].completed, 8000);
    }

    #[test]
    fn test_hit_rate_and_display() {
        let tracker = ProgressTracker::new();
        let worker = tracker.register_worker(0, 10);
        assert_eq!(tracker.snapshot().hit_rate(), 0.0);

        tracker.record_batch(&worker, 5, 3, 1);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.hit_rate(), 0.75);
        assert_eq!(
            snapshot.display_string(),
            "5/10 posts (50.0%) | cache 3 hits, 1 misses (75% hit) | 0 rate limits | 0 errors"
        );
    }

    #[tokio::test]
    async fn test_reporter_stops_on_cancel() {
        let tracker = Arc::new(ProgressTracker::new());
        let cancel = CancellationToken::new();
        let handle = spawn_progress_reporter(tracker, Duration::from_millis(5), cancel.clone());

        cancel.cancel();
        handle.await.unwrap();
    }
}
