//! Scoring results

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Binary score for one (post, trait) pair; `None` when retries were exhausted
pub type Score = Option<u8>;

/// Stored scores for one post, keyed by trait name
pub type TraitScores = HashMap<String, Score>;

/// Result for one post
///
/// `scores` is aligned with the trait list the worker was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredPost {
    pub post_id: String,
    pub content: String,
    pub scores: Vec<Score>,
}

impl ScoredPost {
    /// Build the trait → score mapping stored in the cache
    ///
    /// Traits beyond the end of `scores` are recorded as absent.
    pub fn trait_scores(&self, traits: &[String]) -> TraitScores {
        traits
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), self.scores.get(i).copied().flatten()))
            .collect()
    }

    /// Number of pairs that ended without a score
    pub fn unresolved(&self) -> usize {
        self.scores.iter().filter(|s| s.is_none()).count()
    }
}
