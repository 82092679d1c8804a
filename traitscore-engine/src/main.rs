//! traitscore - score a corpus of posts against behavioral traits
//!
//! Thin orchestration around the engine: load inputs and settings, open the
//! shared cache, start one worker per API key, report progress, and write the
//! merged results as JSON Lines.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use traitscore_common::config::{
    cache_db_path, default_config_path, load_toml_config, resolve_data_folder, LoggingConfig,
    DATA_FOLDER_ENV,
};
use uuid::Uuid;

use traitscore_engine::config::{
    apply_overrides, cache_options, client_settings, resolve_api_keys, worker_config,
    ScoringOverrides,
};
use traitscore_engine::db::{ScoreStore, SqliteScoreCache};
use traitscore_engine::models::post::dedupe_traits;
use traitscore_engine::models::{read_posts_jsonl, read_traits_file, ScoredPost};
use traitscore_engine::services::{CompletionClient, OpenAiClient};
use traitscore_engine::workflow::{
    partition_posts, run_partitions, spawn_progress_reporter, Partition, ProgressTracker,
};

/// Command-line arguments for traitscore
#[derive(Parser, Debug)]
#[command(name = "traitscore")]
#[command(about = "Score posts against behavioral traits with a cached LLM judge")]
#[command(version)]
struct Args {
    /// Posts to score, JSON Lines
    #[arg(long, env = "TRAITSCORE_POSTS")]
    posts: PathBuf,

    /// Trait list file, one trait per line
    #[arg(long)]
    traits: Option<PathBuf>,

    /// Trait to score (repeatable, added after --traits)
    #[arg(long = "trait")]
    trait_names: Vec<String>,

    /// API keys, comma-separated; one worker per key
    #[arg(long, env = "TRAITSCORE_API_KEYS", value_delimiter = ',', hide_env_values = true)]
    api_keys: Vec<String>,

    /// Results file (JSON Lines); stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "TRAITSCORE_CONFIG")]
    config: Option<PathBuf>,

    /// Data folder holding the cache
    #[arg(long)]
    data_folder: Option<PathBuf>,

    /// Cache database path (overrides the data folder location)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Seconds between progress lines
    #[arg(long, default_value = "5")]
    progress_interval_secs: u64,

    #[command(flatten)]
    scoring: ScoringOverrides,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "traitscore={0},traitscore_engine={0},traitscore_common={0}",
            logging.level
        )
        .into()
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

fn write_results(results: &[ScoredPost], output: Option<&PathBuf>) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = std::io::BufWriter::new(writer);

    for result in results {
        serde_json::to_writer(&mut writer, result)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let (mut toml_config, config_source) = load_toml_config(&config_path)?;
    init_tracing(&toml_config.logging)?;
    config_source.log();

    info!("Starting traitscore {}", env!("CARGO_PKG_VERSION"));
    apply_overrides(&mut toml_config.scoring, &args.scoring);
    let settings = toml_config.scoring.clone();

    // Inputs
    let posts = read_posts_jsonl(&args.posts)?;
    let mut traits = match &args.traits {
        Some(path) => read_traits_file(path)?,
        None => Vec::new(),
    };
    traits.extend(args.trait_names.iter().cloned());
    let traits = dedupe_traits(traits);
    if traits.is_empty() {
        bail!("No traits given; use --traits <file> or --trait <name>");
    }
    info!(posts = posts.len(), traits = traits.len(), "Inputs loaded");

    // Cache
    let data_folder =
        resolve_data_folder(args.data_folder.as_deref(), DATA_FOLDER_ENV, &toml_config);
    let cache_path = args.cache.clone().unwrap_or_else(|| cache_db_path(&data_folder));
    info!("Cache: {}", cache_path.display());
    let store: Arc<dyn ScoreStore> =
        Arc::new(SqliteScoreCache::initialize(&cache_path, cache_options(&settings)).await?);

    // One client and one partition per key
    let keys = resolve_api_keys(&args.api_keys, &settings)?;
    let client_settings = client_settings(&settings);
    let partitions = partition_posts(posts, keys.len())
        .into_iter()
        .zip(keys)
        .map(|(posts, key)| -> Result<Partition> {
            let client: Arc<dyn CompletionClient> =
                Arc::new(OpenAiClient::new(key, &client_settings)?);
            Ok(Partition { posts, client })
        })
        .collect::<Result<Vec<_>>>()?;

    let tracker = Arc::new(ProgressTracker::new());
    let cancel = CancellationToken::new();
    let reporter = spawn_progress_reporter(
        tracker.clone(),
        Duration::from_secs(args.progress_interval_secs.max(1)),
        cancel.clone(),
    );

    let run_id = Uuid::new_v4();
    let results = run_partitions(
        partitions,
        traits,
        store,
        worker_config(&settings),
        tracker.clone(),
    )
    .instrument(info_span!("run", %run_id))
    .await;

    cancel.cancel();
    let _ = reporter.await;

    write_results(&results, args.output.as_ref())?;

    let summary = tracker.snapshot();
    info!(
        %run_id,
        unresolved = results.iter().map(ScoredPost::unresolved).sum::<usize>(),
        "Run complete: {}",
        summary.display_string()
    );

    Ok(())
}
