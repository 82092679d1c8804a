//! Scoring workflow: workers, progress, and run orchestration

pub mod orchestrator;
pub mod progress;
pub mod worker;

pub use orchestrator::{partition_posts, run_partitions, Partition};
pub use progress::{spawn_progress_reporter, ProgressSnapshot, ProgressTracker, WorkerProgress};
pub use worker::{process_partition, ScoringWorker, WorkerConfig};
