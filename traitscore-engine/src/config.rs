//! Configuration resolution for traitscore-engine
//!
//! Settings come from, highest priority first: command line, environment
//! (through clap's `env` fallbacks), the TOML `[scoring]` table, then the
//! built-in defaults of [`ScoringSettings`].

use crate::db::CacheOptions;
use crate::services::{ClientSettings, RetryPolicy};
use crate::utils::LockRetry;
use crate::workflow::WorkerConfig;
use clap::Args;
use std::time::Duration;
use tracing::{info, warn};
use traitscore_common::config::ScoringSettings;
use traitscore_common::{Error, Result};

/// Command-line overrides for `[scoring]` settings
#[derive(Args, Debug, Clone, Default)]
pub struct ScoringOverrides {
    /// Model identifier
    #[arg(long, env = "TRAITSCORE_MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "TRAITSCORE_API_BASE")]
    pub api_base: Option<String>,

    /// Token cap for each answer
    #[arg(long)]
    pub max_completion_tokens: Option<u32>,

    /// Concurrent remote calls per worker
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Posts per cache flush
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Requests per minute per worker
    #[arg(long, env = "TRAITSCORE_RPM_LIMIT")]
    pub rpm_limit: Option<usize>,

    /// Attempts for errors other than rate limits
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// HTTP timeout per request, in seconds
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// SQLite busy timeout for cache connections, in seconds
    #[arg(long)]
    pub cache_lock_wait_secs: Option<u64>,
}

/// Apply command-line overrides on top of file settings
pub fn apply_overrides(settings: &mut ScoringSettings, overrides: &ScoringOverrides) {
    if let Some(model) = &overrides.model {
        settings.model = model.clone();
    }
    if let Some(api_base) = &overrides.api_base {
        settings.api_base = api_base.clone();
    }
    if let Some(v) = overrides.max_completion_tokens {
        settings.max_completion_tokens = v;
    }
    if let Some(v) = overrides.concurrency {
        settings.concurrency = v;
    }
    if let Some(v) = overrides.batch_size {
        settings.batch_size = v;
    }
    if let Some(v) = overrides.rpm_limit {
        settings.rpm_limit = v;
    }
    if let Some(v) = overrides.max_retries {
        settings.max_retries = v;
    }
    if let Some(v) = overrides.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = overrides.cache_lock_wait_secs {
        settings.cache_lock_wait_secs = v;
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Pick the API keys for this run, one worker per key
///
/// Keys given on the command line or in the environment replace the TOML
/// list entirely. Blank entries are dropped.
pub fn resolve_api_keys(cli_keys: &[String], settings: &ScoringSettings) -> Result<Vec<String>> {
    let (source, candidates) = if cli_keys.iter().any(|k| is_valid_key(k)) {
        ("command line/environment", cli_keys)
    } else {
        ("TOML config", settings.api_keys.as_slice())
    };

    let blank = candidates.iter().filter(|k| !is_valid_key(k)).count();
    if blank > 0 {
        warn!("Ignoring {} blank API key(s) from {}", blank, source);
    }

    let keys: Vec<String> = candidates
        .iter()
        .filter(|k| is_valid_key(k))
        .map(|k| k.trim().to_string())
        .collect();

    if keys.is_empty() {
        return Err(Error::Config(
            "No API keys configured. Provide one of:\n\
             1. Command line: --api-keys key1,key2\n\
             2. Environment: TRAITSCORE_API_KEYS=key1,key2\n\
             3. TOML config: [scoring] api_keys = [\"key1\"]"
                .to_string(),
        ));
    }

    info!("Loaded {} API key(s) from {}", keys.len(), source);
    Ok(keys)
}

pub fn worker_config(settings: &ScoringSettings) -> WorkerConfig {
    WorkerConfig {
        concurrency: settings.concurrency,
        batch_size: settings.batch_size,
        rpm_limit: settings.rpm_limit,
        retry: RetryPolicy::default().with_max_retries(settings.max_retries),
    }
}

pub fn client_settings(settings: &ScoringSettings) -> ClientSettings {
    ClientSettings {
        api_base: settings.api_base.clone(),
        model: settings.model.clone(),
        max_completion_tokens: settings.max_completion_tokens,
        timeout: Duration::from_secs(settings.request_timeout_secs),
    }
}

pub fn cache_options(settings: &ScoringSettings) -> CacheOptions {
    CacheOptions {
        lock_wait: Duration::from_secs(settings.cache_lock_wait_secs),
        write_retry: LockRetry::default(),
    }
}
