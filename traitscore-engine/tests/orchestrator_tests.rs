//! Multi-worker run tests

mod helpers;

use helpers::*;
use std::sync::Arc;
use traitscore_engine::db::ScoreStore;
use traitscore_engine::services::CompletionClient;
use traitscore_engine::workflow::{partition_posts, run_partitions, Partition, ProgressTracker};

#[tokio::test]
async fn test_workers_split_posts_and_merge_in_order() {
    let (_dir, cache) = temp_cache().await;
    let ids: Vec<String> = (0..7).map(|i| format!("p{}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let clients: Vec<Arc<StubClient>> = (0..3)
        .map(|_| Arc::new(StubClient::answering_yes_for(&["A"])))
        .collect();
    let partitions: Vec<Partition> = partition_posts(posts(&id_refs), clients.len())
        .into_iter()
        .zip(&clients)
        .map(|(posts, client)| Partition {
            posts,
            client: client.clone() as Arc<dyn CompletionClient>,
        })
        .collect();

    let tracker = Arc::new(ProgressTracker::new());
    let results = run_partitions(
        partitions,
        traits(&["A", "B"]),
        cache.clone(),
        fast_worker_config(2, 2, 100),
        tracker.clone(),
    )
    .await;

    let result_ids: Vec<&str> = results.iter().map(|r| r.post_id.as_str()).collect();
    assert_eq!(result_ids, id_refs);
    assert!(results.iter().all(|r| r.scores == vec![Some(1), Some(0)]));

    // Partitions of 3, 2, 2 posts, two traits each, one client per partition
    let calls: Vec<usize> = clients.iter().map(|c| c.calls()).collect();
    assert_eq!(calls, vec![6, 4, 4]);

    let progress = tracker.snapshot();
    assert_eq!(progress.completed, 7);
    assert_eq!(progress.total(), 7);
    let worker_ids: Vec<u32> = progress.workers.iter().map(|w| w.worker_id).collect();
    assert_eq!(worker_ids, vec![0, 1, 2]);

    assert_eq!(cache.load_all().await.len(), 7);
}

#[tokio::test]
async fn test_no_partitions_returns_nothing() {
    let (_dir, cache) = temp_cache().await;
    let results = run_partitions(
        Vec::new(),
        traits(&["A"]),
        cache,
        fast_worker_config(1, 1, 10),
        Arc::new(ProgressTracker::new()),
    )
    .await;
    assert!(results.is_empty());
}
