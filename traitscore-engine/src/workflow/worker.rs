//! Scoring worker
//!
//! Scores one partition of posts against every trait. Pairs already in the
//! cache snapshot are answered locally; the rest go to the remote endpoint
//! through the worker's rate limiter, then its concurrency gate, under the
//! retry policy.
//!
//! Posts are handled in batches of `batch_size`. All pairs of a batch run
//! concurrently as futures inside the worker's own task, and each finished
//! batch is written to the cache before the next one starts, so a crash loses
//! at most one batch.

use crate::db::{CacheSnapshot, ScoreStore};
use crate::error::ScoringError;
use crate::models::{Post, Score, ScoredPost};
use crate::services::{
    build_prompt, interpret_answer, CompletionClient, ConcurrencyGate, RateLimiter, RetryPolicy,
};
use crate::workflow::progress::{ProgressTracker, WorkerProgress};
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, Instrument};

/// Per-worker limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Remote calls in flight at once
    pub concurrency: usize,
    /// Posts per cache flush
    pub batch_size: usize,
    /// Requests per trailing minute
    pub rpm_limit: usize,
    pub retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            batch_size: 10,
            rpm_limit: 500,
            retry: RetryPolicy::default(),
        }
    }
}

/// Cache hits and misses since the last batch flush
#[derive(Debug, Default)]
struct LookupStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LookupStats {
    /// Read and reset both counters
    fn take(&self) -> (u64, u64) {
        (
            self.hits.swap(0, Ordering::Relaxed),
            self.misses.swap(0, Ordering::Relaxed),
        )
    }
}

/// Worker bound to one credential and one partition
pub struct ScoringWorker {
    worker_id: u32,
    traits: Vec<String>,
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn ScoreStore>,
    cache: CacheSnapshot,
    limiter: RateLimiter,
    gate: ConcurrencyGate,
    retry: RetryPolicy,
    batch_size: usize,
    stats: LookupStats,
    tracker: Arc<ProgressTracker>,
    progress: Arc<WorkerProgress>,
}

impl ScoringWorker {
    /// Load the cache snapshot and register this worker's progress counters
    ///
    /// The snapshot is taken once; writes made by other workers afterwards
    /// are not seen by this worker.
    pub async fn start(
        worker_id: u32,
        total_posts: usize,
        traits: Vec<String>,
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn ScoreStore>,
        config: WorkerConfig,
        tracker: Arc<ProgressTracker>,
    ) -> Self {
        let cache = store.load_all().await;
        let progress = tracker.register_worker(worker_id, total_posts);

        debug!(
            worker_id,
            cached_posts = cache.len(),
            total_posts,
            "Worker started"
        );

        Self {
            worker_id,
            traits,
            client,
            store,
            cache,
            limiter: RateLimiter::new(config.rpm_limit),
            gate: ConcurrencyGate::new(config.concurrency),
            retry: config.retry,
            batch_size: config.batch_size.max(1),
            stats: LookupStats::default(),
            tracker,
            progress,
        }
    }

    /// Score every post, batch by batch, in input order
    pub async fn run(&self, posts: &[Post]) -> Vec<ScoredPost> {
        let started = Instant::now();
        let mut results = Vec::with_capacity(posts.len());

        for (batch_index, batch) in posts.chunks(self.batch_size).enumerate() {
            let batch_results = join_all(batch.iter().map(|post| self.score_post(post))).await;

            if let Err(e) = self.store.write_batch(&batch_results, &self.traits).await {
                // Results stay in the returned list; only persistence is lost
                error!(
                    worker_id = self.worker_id,
                    batch = batch_index,
                    posts = batch_results.len(),
                    "Batch not saved to cache, its posts will be rescored next run: {}",
                    e
                );
            }

            let (hits, misses) = self.stats.take();
            self.tracker.record_batch(&self.progress, batch.len(), hits, misses);

            debug!(
                worker_id = self.worker_id,
                batch = batch_index,
                hits,
                misses,
                "Batch complete"
            );

            results.extend(batch_results);
        }

        info!(
            worker_id = self.worker_id,
            posts = results.len(),
            rate_limits = self.progress.rate_limits(),
            errors = self.progress.errors(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Worker finished"
        );

        results
    }

    /// Score one post against every trait concurrently
    pub async fn score_post(&self, post: &Post) -> ScoredPost {
        let scores = join_all(
            self.traits
                .iter()
                .map(|trait_name| self.score_one(&post.id, &post.content, trait_name)),
        )
        .await;

        ScoredPost {
            post_id: post.id.clone(),
            content: post.content.clone(),
            scores,
        }
    }

    /// Resolve one (post, trait) pair
    ///
    /// A cached non-null score is returned without touching the limiter, the
    /// gate or the endpoint. `None` means every allowed attempt failed.
    pub async fn score_one(&self, post_id: &str, content: &str, trait_name: &str) -> Score {
        if let Some(score) = self.cached(post_id, trait_name) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Some(score);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let prompt = build_prompt(trait_name, content);
        let span = info_span!("score", worker_id = self.worker_id, post_id, trait_name);

        let outcome = self
            .retry
            .run(
                || self.request_score(&prompt),
                || self.progress.record_rate_limit(),
            )
            .instrument(span)
            .await;

        match outcome {
            Ok(score) => Some(score),
            Err(exhausted) => {
                self.progress.record_error();
                error!(
                    worker_id = self.worker_id,
                    post_id,
                    trait_name,
                    attempts = exhausted.attempts,
                    "Scoring failed permanently: {}",
                    exhausted.error
                );
                None
            }
        }
    }

    fn cached(&self, post_id: &str, trait_name: &str) -> Option<u8> {
        self.cache.get(post_id)?.get(trait_name).copied().flatten()
    }

    /// One remote attempt: limiter slot, then gate permit, then the call
    async fn request_score(&self, prompt: &str) -> Result<u8, ScoringError> {
        self.limiter.acquire().await;
        let _permit = self.gate.acquire().await?;
        let answer = self.client.complete(prompt).await?;
        Ok(interpret_answer(&answer))
    }
}

/// Score one partition with a fresh worker
///
/// Individual pair failures show up as `None` scores and in the worker's error
/// counter; they never abort the partition.
pub async fn process_partition(
    worker_id: u32,
    posts: Vec<Post>,
    traits: Vec<String>,
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn ScoreStore>,
    config: WorkerConfig,
    tracker: Arc<ProgressTracker>,
) -> Vec<ScoredPost> {
    let worker = ScoringWorker::start(
        worker_id,
        posts.len(),
        traits,
        client,
        store,
        config,
        tracker,
    )
    .await;
    worker.run(&posts).await
}
