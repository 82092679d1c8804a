//! Shared test utilities: scripted completion clients, stores, temp caches
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use traitscore_common::{Error, Result};
use traitscore_engine::db::{CacheOptions, CacheSnapshot, ScoreStore, SqliteScoreCache};
use traitscore_engine::models::{Post, ScoredPost};
use traitscore_engine::services::{CompletionClient, RetryPolicy};
use traitscore_engine::utils::LockRetry;
use traitscore_engine::workflow::WorkerConfig;
use traitscore_engine::ScoringError;

type Responder = dyn Fn(usize, &str) -> std::result::Result<String, ScoringError> + Send + Sync;

/// Completion client driven by a closure of (call index, trait name)
///
/// Counts calls and records the highest number of calls in flight at once.
pub struct StubClient {
    respond: Box<Responder>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubClient {
    pub fn new(
        respond: impl Fn(usize, &str) -> std::result::Result<String, ScoringError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answers "Yes" for traits in `yes_traits`, "No" otherwise
    pub fn answering_yes_for(yes_traits: &[&str]) -> Self {
        let yes: Vec<String> = yes_traits.iter().map(|t| t.to_string()).collect();
        Self::new(move |_, trait_name| {
            if yes.iter().any(|t| t == trait_name) {
                Ok("Yes".to_string())
            } else {
                Ok("No".to_string())
            }
        })
    }

    /// Fails every call with `make_error`
    pub fn always_failing(make_error: fn() -> ScoringError) -> Self {
        Self::new(move |_, _| Err(make_error()))
    }

    /// Hold each call open for `delay` so concurrency can be observed
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for StubClient {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ScoringError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = (self.respond)(index, trait_of(prompt));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Trait name out of "Does the text explicitly display {trait}? ..."
pub fn trait_of(prompt: &str) -> &str {
    prompt
        .strip_prefix("Does the text explicitly display ")
        .and_then(|rest| rest.split_once('?'))
        .map(|(name, _)| name)
        .unwrap_or("")
}

pub fn server_error() -> ScoringError {
    ScoringError::Http {
        status: 500,
        body: "internal server error".to_string(),
    }
}

pub fn throttled() -> ScoringError {
    ScoringError::Http {
        status: 429,
        body: "Rate limit reached".to_string(),
    }
}

/// Store whose writes always fail; reads return a fixed snapshot
#[derive(Default)]
pub struct FailingStore {
    pub snapshot: CacheSnapshot,
    pub write_attempts: AtomicUsize,
}

#[async_trait]
impl ScoreStore for FailingStore {
    async fn load_all(&self) -> CacheSnapshot {
        self.snapshot.clone()
    }

    async fn write_batch(&self, _results: &[ScoredPost], _traits: &[String]) -> Result<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::Internal("disk full".to_string()))
    }
}

/// Cache options with millisecond waits for lock tests
pub fn fast_cache_options() -> CacheOptions {
    CacheOptions {
        lock_wait: Duration::from_millis(20),
        write_retry: LockRetry {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1),
        },
    }
}

/// Fresh SQLite cache in a temp dir; keep the TempDir alive for the test
pub async fn temp_cache() -> (TempDir, Arc<SqliteScoreCache>) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cache").join("trait_cache.db");
    let cache = SqliteScoreCache::initialize(&path, CacheOptions::default())
        .await
        .unwrap();
    (temp_dir, Arc::new(cache))
}

/// Worker limits with millisecond backoffs
pub fn fast_worker_config(concurrency: usize, batch_size: usize, rpm_limit: usize) -> WorkerConfig {
    WorkerConfig {
        concurrency,
        batch_size,
        rpm_limit,
        retry: fast_retry(5),
    }
}

pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
    }
}

pub fn posts(ids: &[&str]) -> Vec<Post> {
    ids.iter()
        .map(|id| Post::new(*id, format!("content of {}", id)))
        .collect()
}

pub fn traits(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// In-memory log sink for a test subscriber
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Install a plain-text subscriber writing here for the current thread
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
