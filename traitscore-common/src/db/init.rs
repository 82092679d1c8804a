//! Database initialization
//!
//! Opens (creating if needed) the SQLite file backing the score cache and
//! makes sure the `scores` table exists. Every step is idempotent, so several
//! workers or processes may run it against the same file at once.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default SQLite busy timeout for cache connections
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(30);

/// Open the cache database and create the schema if needed
///
/// Connections use WAL journaling so readers never block the single writer,
/// and `busy_timeout = lock_wait` so a writer waits for a competing lock
/// before SQLite reports `database is locked`.
pub async fn init_database(db_path: &Path, lock_wait: Duration) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(lock_wait);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new cache database: {}", db_path.display());
    } else {
        info!("Opened existing cache database: {}", db_path.display());
    }

    create_scores_table(&pool).await?;

    Ok(pool)
}

/// Create the `scores` table
///
/// One row per post; `scores` holds a JSON object mapping trait name to
/// `0`, `1` or `null`.
pub async fn create_scores_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scores (
            post_id TEXT PRIMARY KEY,
            scores TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
