//! Durable score cache
//!
//! The worker talks to the cache through [`ScoreStore`] so tests can swap in
//! stores that fail or count calls; [`SqliteScoreCache`] is the real one.

pub mod scores;

pub use scores::{CacheOptions, SqliteScoreCache};

use crate::models::{ScoredPost, TraitScores};
use async_trait::async_trait;
use std::collections::HashMap;
use traitscore_common::Result;

/// Full cache contents: post id → trait → score
pub type CacheSnapshot = HashMap<String, TraitScores>;

/// Persistence for scored pairs
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Read every stored record
    ///
    /// Never fails: a store that cannot be read is reported and treated as empty.
    async fn load_all(&self) -> CacheSnapshot;

    /// Upsert one record per result, replacing any earlier record for that post
    ///
    /// All rows of the batch commit together. `scores` in each result are
    /// aligned with `traits`.
    async fn write_batch(&self, results: &[ScoredPost], traits: &[String]) -> Result<()>;
}
