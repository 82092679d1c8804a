//! SQLite-backed score cache
//!
//! One row per post in `scores(post_id TEXT PRIMARY KEY, scores TEXT NOT NULL)`,
//! `scores` being a JSON object of trait name → `0`/`1`/`null`.

use super::{CacheSnapshot, ScoreStore};
use crate::models::{Score, ScoredPost, TraitScores};
use crate::utils::{retry_on_lock, LockRetry};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use traitscore_common::db::init::{init_database, DEFAULT_LOCK_WAIT};
use traitscore_common::{Error, Result};

/// Cache connection and retry settings
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// SQLite busy timeout per statement
    pub lock_wait: Duration,
    /// Retry schedule when a write still finds the database locked
    pub write_retry: LockRetry,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            lock_wait: DEFAULT_LOCK_WAIT,
            write_retry: LockRetry::default(),
        }
    }
}

/// Score cache stored in a shared SQLite file
#[derive(Clone)]
pub struct SqliteScoreCache {
    pool: SqlitePool,
    path: PathBuf,
    options: CacheOptions,
}

impl SqliteScoreCache {
    /// Open the cache file, creating it and its schema if needed
    ///
    /// Safe to call from many workers at once; contention while another
    /// caller is creating the file is retried like a write.
    pub async fn initialize(path: &Path, options: CacheOptions) -> Result<Self> {
        let pool = retry_on_lock("cache initialize", options.write_retry, || {
            init_database(path, options.lock_wait)
        })
        .await?;

        Ok(Self {
            pool,
            path: path.to_path_buf(),
            options,
        })
    }

    /// Wrap an existing pool whose `scores` table is already created
    pub fn from_pool(pool: SqlitePool, options: CacheOptions) -> Self {
        Self {
            pool,
            path: PathBuf::new(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Read every row, skipping rows that do not decode
    ///
    /// Only a failed query is an error; a bad row costs that post alone.
    async fn try_load_all(&self) -> Result<CacheSnapshot> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT post_id, scores FROM scores")
            .fetch_all(&self.pool)
            .await?;

        let total = rows.len();
        let snapshot: CacheSnapshot = rows
            .into_iter()
            .filter_map(|(post_id, json)| match decode_scores(&json) {
                Ok(scores) => Some((post_id, scores)),
                Err(e) => {
                    warn!(post_id = %post_id, "Skipping unreadable cache row: {}", e);
                    None
                }
            })
            .collect();

        if snapshot.len() < total {
            warn!(
                skipped = total - snapshot.len(),
                loaded = snapshot.len(),
                "Some cache rows could not be read and will be rescored"
            );
        }
        Ok(snapshot)
    }

    async fn try_write_batch(&self, rows: &[(String, String)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (post_id, json) in rows {
            sqlx::query("INSERT OR REPLACE INTO scores (post_id, scores) VALUES (?, ?)")
                .bind(post_id)
                .bind(json)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Decode a stored trait map
///
/// The row must be a JSON object. Values are read leniently: `0`/`1`,
/// booleans and whole numbers map to a score; `null` and anything else
/// (fractions, strings, nested values) is treated as absent, so only that
/// pair is asked again.
fn decode_scores(json: &str) -> Result<TraitScores> {
    let raw: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;

    Ok(raw
        .into_iter()
        .map(|(trait_name, value)| (trait_name, score_from_json(&value)))
        .collect())
}

fn score_from_json(value: &serde_json::Value) -> Score {
    match value {
        serde_json::Value::Bool(b) => Some(u8::from(*b)),
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .and_then(|v| u8::try_from(v).ok()),
        _ => None,
    }
}

/// Serialize one post's scores with traits in a stable order
fn encode_scores(result: &ScoredPost, traits: &[String]) -> Result<String> {
    let ordered: BTreeMap<String, Score> = result.trait_scores(traits).into_iter().collect();
    serde_json::to_string(&ordered).map_err(|e| Error::Serialization(e.to_string()))
}

#[async_trait]
impl ScoreStore for SqliteScoreCache {
    async fn load_all(&self) -> CacheSnapshot {
        match self.try_load_all().await {
            Ok(snapshot) => {
                debug!(posts = snapshot.len(), "Loaded score cache");
                snapshot
            }
            Err(e) => {
                warn!("Could not load score cache, starting cold: {}", e);
                CacheSnapshot::new()
            }
        }
    }

    async fn write_batch(&self, results: &[ScoredPost], traits: &[String]) -> Result<()> {
        if results.is_empty() {
            return Ok(());
        }

        let rows = results
            .iter()
            .map(|r| -> Result<(String, String)> {
                Ok((r.post_id.clone(), encode_scores(r, traits)?))
            })
            .collect::<Result<Vec<_>>>()?;

        retry_on_lock("cache batch write", self.options.write_retry, || {
            self.try_write_batch(&rows)
        })
        .await?;

        debug!(rows = rows.len(), "Saved batch to score cache");
        Ok(())
    }
}
