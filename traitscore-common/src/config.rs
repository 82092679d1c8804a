//! Configuration loading and data folder resolution
//!
//! Bootstrap configuration comes from an optional TOML file. Every field has a
//! built-in default, so a missing file is never fatal: the defaults are used
//! and [`ConfigSource`] tells the caller to warn about it. A file that exists
//! but does not parse is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "TRAITSCORE_DATA_FOLDER";

/// Cache database file name inside `<data_folder>/cache/`
pub const CACHE_DB_FILE: &str = "trait_cache.db";

/// Bootstrap configuration loaded from `traitscore.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Folder holding the cache database (optional)
    ///
    /// If not specified, resolution falls through to environment → OS default
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scoring engine knobs
    #[serde(default)]
    pub scoring: ScoringSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Scoring engine settings
///
/// Anything given on the command line or through the environment wins over
/// these values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringSettings {
    /// Model identifier sent with every completion request
    pub model: String,
    /// Base URL of the OpenAI-compatible API
    pub api_base: String,
    /// Token cap for the one-word answer
    pub max_completion_tokens: u32,
    /// In-flight remote calls allowed per worker
    pub concurrency: usize,
    /// Posts per cache flush
    pub batch_size: usize,
    /// Requests per minute allowed per worker
    pub rpm_limit: usize,
    /// Attempts allowed for errors that are not rate limits
    pub max_retries: u32,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
    /// SQLite busy timeout for cache connections
    pub cache_lock_wait_secs: u64,
    /// API keys, one worker per key
    pub api_keys: Vec<String>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            model: "gpt-5-nano".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            max_completion_tokens: 10,
            concurrency: 10,
            batch_size: 10,
            rpm_limit: 500,
            max_retries: 5,
            request_timeout_secs: 60,
            cache_lock_wait_secs: 30,
            api_keys: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// No file at this path; built-in defaults in use
    Defaults(PathBuf),
}

impl ConfigSource {
    /// Report the source once logging is up
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Defaults(path) => warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            ),
        }
    }
}

/// Load the TOML bootstrap configuration
///
/// A missing file yields the defaults; an unreadable or malformed file is an
/// error. Nothing is logged here; call [`ConfigSource::log`] once a
/// subscriber is installed.
pub fn load_toml_config(path: &Path) -> Result<(TomlConfig, ConfigSource)> {
    if !path.exists() {
        return Ok((TomlConfig::default(), ConfigSource::Defaults(path.to_path_buf())));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    Ok((config, ConfigSource::File(path.to_path_buf())))
}

/// Write a configuration back to disk (used by tooling and tests)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Write to a sibling temp file and rename so readers never see a partial file
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Default location of `traitscore.toml`
///
/// `~/.config/traitscore/traitscore.toml` on Linux, the platform config
/// directory elsewhere.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("traitscore").join("traitscore.toml"))
        .unwrap_or_else(|| PathBuf::from("traitscore.toml"))
}

/// Data folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config `data_folder`
/// 4. OS-dependent default
pub fn resolve_data_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.data_folder {
        return path.clone();
    }

    default_data_folder()
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("traitscore"))
        .unwrap_or_else(|| PathBuf::from("./traitscore_data"))
}

/// Cache database path inside a data folder
pub fn cache_db_path(data_folder: &Path) -> PathBuf {
    data_folder.join("cache").join(CACHE_DB_FILE)
}
