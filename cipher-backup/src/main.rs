//! Cipher Backup - Main entry point
//!
//! Runs one encrypted backup of a directory and exits.

use anyhow::{Context, Result};
use cipher_backup::config::Config;
use cipher_backup::executor::outcome::{RunEvent, RunLog, RunOutcome};
use cipher_backup::store::{self, ObjectStore};
use cipher_backup::utils::format::{format_bytes, format_duration_ms};
use cipher_backup::{utils, BackupJob, Pipeline};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "cipher-backup.toml")]
    config: PathBuf,

    /// Directory to back up (overrides config)
    #[arg(short, long, value_name = "DIR")]
    source: Option<PathBuf>,

    /// Archive file name (overrides config)
    #[arg(short, long)]
    archive_name: Option<String>,

    /// Run log path (overrides config)
    #[arg(long, value_name = "FILE")]
    run_log: Option<PathBuf>,

    /// Keep the local archive after a successful upload
    #[arg(long)]
    keep_archive: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration; a failure is reported once the run log is open
    let loaded = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()));
    let log_defaults = loaded
        .as_ref()
        .map(|c| c.log.clone())
        .unwrap_or_default();

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&log_defaults.level);
    utils::logger::init(log_level)?;

    tracing::info!("Starting cipher-backup v{}", env!("CARGO_PKG_VERSION"));

    let run_log_path = args.run_log.clone().unwrap_or(log_defaults.run_log);
    let mut run_log = RunLog::open(&run_log_path)
        .with_context(|| format!("Failed to open run log {}", run_log_path.display()))?;

    let (job, store) = match prepare(&args, loaded).await {
        Ok(prepared) => prepared,
        Err(e) => {
            let outcome = RunOutcome::new(
                Uuid::new_v4(),
                RunEvent::StartupFailed {
                    error: format!("{:#}", e),
                },
            );
            if let Err(log_err) = run_log.record(&outcome) {
                tracing::warn!(
                    "Failed to write run log {}: {}",
                    run_log_path.display(),
                    log_err
                );
            }
            return Err(e);
        }
    };

    let keep_archive = job.keep_archive;
    let mut pipeline = Pipeline::new(job, store, run_log);
    let report = pipeline.run().await?;

    tracing::info!(
        "Backup {} uploaded as {}: {} files, {} plaintext, {} archive, {}",
        report.run_id,
        report.destination_key,
        report.members,
        format_bytes(report.plaintext_bytes),
        format_bytes(report.archive_bytes),
        format_duration_ms(report.duration_ms)
    );
    if keep_archive {
        tracing::info!("Local archive kept at {}", report.archive_path.display());
    }

    Ok(())
}

/// Apply CLI overrides, load the key and connect to the store.
async fn prepare(
    args: &Args,
    loaded: Result<Config>,
) -> Result<(BackupJob, Arc<dyn ObjectStore>)> {
    let mut config = loaded?;

    if let Some(source) = &args.source {
        config.job.source_dir = source.clone();
    }
    if let Some(archive_name) = &args.archive_name {
        config.job.archive_name = archive_name.clone();
    }
    if args.keep_archive {
        config.job.keep_archive = true;
    }

    tracing::info!("Preparing job {}", config.job.name);

    let store = store::connect(&config.store, &config.job.name)
        .await
        .context("Failed to set up object store")?;
    let job = config.to_job(&store.describe())?;

    Ok((job, store))
}
