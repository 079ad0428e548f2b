//! evimport ingest library
//!
//! Streams newline-delimited JSON events out of a zip archive and uploads
//! them to an HTTP ingestion endpoint.
//!
//! # Pipeline
//!
//! - [`source::ArchiveSource`]: lines of the archive's first entry
//! - [`ingest::IngestionLoop`]: resume, filter, and group events
//! - [`batch::BatchUploader`]: cut a group into batches and upload them concurrently
//! - [`executor::TrackingExecutor`]: bounded worker pool that can be drained
//! - [`upload::UploadJob`]: one batch, one request, retried by [`retry::RetryRunner`]
//!
//! # Example
//!
//! ```no_run
//! use evimport_ingest::{ArchiveSource, BatchUploader, ImportConfig, IngestionLoop};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ImportConfig::load()?;
//!     config.validate()?;
//!     let config = Arc::new(config);
//!
//!     let ingestion = IngestionLoop::new(BatchUploader::new(config.clone())?, &config);
//!     let mut source = ArchiveSource::open("events.zip")?;
//!     let summary = ingestion.run(source.lines()?, 0).await?;
//!     println!("{} events uploaded", summary.events_uploaded);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod batch;
pub mod config;
pub mod event;
pub mod executor;
pub mod ingest;
pub mod retry;
pub mod source;
pub mod upload;

pub use batch::{BatchUploader, GroupUploader};
pub use config::ImportConfig;
pub use event::Event;
pub use executor::{ExecutorError, JobError, JobHandle, TrackingExecutor};
pub use ingest::{IngestSummary, IngestionLoop};
pub use retry::RetryRunner;
pub use source::ArchiveSource;
pub use upload::{UploadClient, UploadError, UploadJob};
