//! traitscore-engine library interface
//!
//! Scores posts against behavioral traits with one LLM completion per
//! (post, trait) pair, caching every result so reruns never repeat a call.
//!
//! - [`db`]: durable score cache
//! - [`services`]: completion client, rate limiter, concurrency gate, retry policy
//! - [`workflow`]: scoring workers, progress tracking, run orchestration

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
pub mod workflow;

pub use crate::error::ScoringError;
pub use crate::models::{Post, Score, ScoredPost};
pub use crate::workflow::{process_partition, ProgressTracker, ScoringWorker, WorkerConfig};
