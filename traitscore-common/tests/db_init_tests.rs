//! Integration tests for cache database initialization
//!
//! Covers first-run creation, reopening an existing file, and concurrent
//! initialization from several callers.

use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinSet;
use traitscore_common::db::init::{init_database, DEFAULT_LOCK_WAIT};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("cache").join("trait_cache.db");
    assert!(!db_path.exists());

    let result = init_database(&db_path, DEFAULT_LOCK_WAIT).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());

    // Parent directory and file both created
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("trait_cache.db");

    let pool1 = init_database(&db_path, DEFAULT_LOCK_WAIT).await.unwrap();
    sqlx::query("INSERT INTO scores (post_id, scores) VALUES ('p1', '{}')")
        .execute(&pool1)
        .await
        .unwrap();

    let pool2 = init_database(&db_path, DEFAULT_LOCK_WAIT).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    // Existing rows survive re-initialization
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scores")
        .fetch_one(&pool2.unwrap())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_scores_table_schema() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("trait_cache.db");
    let pool = init_database(&db_path, DEFAULT_LOCK_WAIT).await.unwrap();

    let columns: Vec<(String, String, i64, i64)> = sqlx::query_as(
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info('scores') ORDER BY cid",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(
        columns,
        vec![
            ("post_id".to_string(), "TEXT".to_string(), 0, 1),
            ("scores".to_string(), "TEXT".to_string(), 1, 0),
        ]
    );
}

#[tokio::test]
async fn test_concurrent_initialization_safe() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("trait_cache.db");

    let mut join_set = JoinSet::new();
    for i in 0..8 {
        let path = db_path.clone();
        join_set.spawn(async move {
            init_database(&path, Duration::from_secs(10))
                .await
                .unwrap_or_else(|e| panic!("Task {} failed to initialize: {}", i, e));
            i
        });
    }

    let mut task_ids = Vec::new();
    while let Some(result) = join_set.join_next().await {
        task_ids.push(result.expect("Task panicked"));
    }

    task_ids.sort();
    assert_eq!(task_ids, (0..8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_path_with_url_characters() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("run #2?mode=ro 100%").join("trait_cache.db");

    let pool = init_database(&db_path, DEFAULT_LOCK_WAIT).await.unwrap();
    sqlx::query("INSERT INTO scores (post_id, scores) VALUES ('p1', '{}')")
        .execute(&pool)
        .await
        .unwrap();

    // The file lands at the literal path, not a URL-mangled one
    assert!(db_path.exists(), "expected {}", db_path.display());
}
