//! Run orchestration
//!
//! Splits the corpus into one partition per credential, runs a worker per
//! partition as its own tokio task, and merges results back in partition
//! order.

use crate::db::ScoreStore;
use crate::models::{Post, ScoredPost};
use crate::services::CompletionClient;
use crate::workflow::progress::ProgressTracker;
use crate::workflow::worker::{process_partition, WorkerConfig};
use std::sync::Arc;
use tracing::{error, info};

/// Posts assigned to one worker together with its client
pub struct Partition {
    pub posts: Vec<Post>,
    pub client: Arc<dyn CompletionClient>,
}

/// Split `posts` into at most `parts` contiguous slices of near-equal size
///
/// Earlier partitions take the remainder, so sizes differ by at most one.
/// Empty slices are never produced.
pub fn partition_posts(posts: Vec<Post>, parts: usize) -> Vec<Vec<Post>> {
    let parts = parts.max(1).min(posts.len().max(1));
    let base = posts.len() / parts;
    let extra = posts.len() % parts;

    let mut iter = posts.into_iter();
    (0..parts)
        .map(|i| {
            let size = base + usize::from(i < extra);
            iter.by_ref().take(size).collect::<Vec<_>>()
        })
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

/// Run one worker per partition in parallel and merge their results
///
/// Worker ids follow partition order. A worker task that panics is logged and
/// its posts are missing from the output; the other workers are unaffected.
pub async fn run_partitions(
    partitions: Vec<Partition>,
    traits: Vec<String>,
    store: Arc<dyn ScoreStore>,
    config: WorkerConfig,
    tracker: Arc<ProgressTracker>,
) -> Vec<ScoredPost> {
    info!(
        workers = partitions.len(),
        traits = traits.len(),
        "Launching scoring workers"
    );

    let handles: Vec<_> = partitions
        .into_iter()
        .enumerate()
        .map(|(idx, partition)| {
            let worker_id = idx as u32;
            let handle = tokio::spawn(process_partition(
                worker_id,
                partition.posts,
                traits.clone(),
                partition.client,
                store.clone(),
                config,
                tracker.clone(),
            ));
            (worker_id, handle)
        })
        .collect();

    let mut results = Vec::new();
    for (worker_id, handle) in handles {
        match handle.await {
            Ok(worker_results) => results.extend(worker_results),
            Err(e) => error!(worker_id, "Worker task failed: {}", e),
        }
    }

    results
}
