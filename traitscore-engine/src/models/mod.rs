//! Data models for the scoring engine

pub mod post;
pub mod scored_post;

pub use post::{read_posts_jsonl, read_traits_file, Post};
pub use scored_post::{Score, ScoredPost, TraitScores};
