//! evimport - upload a zipped NDJSON event log

use anyhow::{Context, Result};
use clap::Parser;
use evimport_common::logging::{init_logging, LogConfig, LogLevel};
use evimport_ingest::{ArchiveSource, BatchUploader, ImportConfig, IngestionLoop};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "evimport")]
#[command(author, version, about = "Upload a zipped NDJSON event log in concurrent batches")]
struct Cli {
    /// Zip archive whose first entry holds one JSON event per line
    archive: PathBuf,

    /// Resume after this row; rows up to and including it are skipped
    start_row: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .level(LogLevel::Info)
        .log_file_prefix("evimport")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    info!("start event import");

    let config = ImportConfig::load()?;
    config.validate()?;
    let config = Arc::new(config);

    let uploader = BatchUploader::new(config.clone()).context("Failed to build HTTP client")?;
    let ingestion = IngestionLoop::new(uploader, &config);

    let mut source = ArchiveSource::open(&cli.archive)
        .with_context(|| format!("Failed to open {}", cli.archive.display()))?;
    let lines = source.lines()?;

    let summary = ingestion.run(lines, cli.start_row).await?;

    info!(
        events_uploaded = summary.events_uploaded,
        groups_uploaded = summary.groups_uploaded,
        "Import complete"
    );
    Ok(())
}
