//! Concurrent upload of one group of events
//!
//! A group is cut into request-sized batches, every batch is submitted to a
//! fresh executor session, and the call returns only once the session has
//! drained.

use crate::config::ImportConfig;
use crate::event::Event;
use crate::executor::{ExecutorError, TrackingExecutor};
use crate::upload::{UploadClient, UploadError, UploadJob};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Uploads one accumulated group; the ingestion loop depends only on this
#[async_trait]
pub trait GroupUploader: Send + Sync {
    /// Upload `events`; `row` is the source row of the last event
    async fn upload(&self, events: Vec<Event>, row: u64) -> Result<(), ExecutorError>;
}

/// Uploads a group through a bounded, tracked executor session
pub struct BatchUploader {
    client: UploadClient,
    max_workers: usize,
    batch_size: usize,
}

impl BatchUploader {
    pub fn new(config: Arc<ImportConfig>) -> Result<Self, UploadError> {
        let max_workers = config.max_workers;
        let batch_size = config.batch_size;
        Ok(Self {
            client: UploadClient::new(config)?,
            max_workers,
            batch_size,
        })
    }
}

#[async_trait]
impl GroupUploader for BatchUploader {
    async fn upload(&self, events: Vec<Event>, row: u64) -> Result<(), ExecutorError> {
        let started = Instant::now();
        let total = events.len();
        let batches = partition(events, self.batch_size);

        TrackingExecutor::new(self.max_workers)
            .scoped(|session| {
                for (offset, batch) in batches {
                    let job = UploadJob::new(self.client.clone(), batch, row + offset as u64);
                    session.submit(job.run())?;
                }
                Ok::<_, ExecutorError>(())
            })
            .await?;

        let elapsed = started.elapsed();
        info!(
            events = total,
            elapsed_ms = elapsed.as_millis() as u64,
            "uploading {} events took {:.3}s",
            total,
            elapsed.as_secs_f64()
        );
        Ok(())
    }
}

/// Split `events` into consecutive batches of at most `batch_size`
///
/// Each batch is paired with the offset of its first event in the group.
/// A `batch_size` of zero is treated as one.
pub fn partition(events: Vec<Event>, batch_size: usize) -> Vec<(usize, Vec<Event>)> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(events.len().div_ceil(batch_size));
    let mut remaining = events.into_iter();
    let mut offset = 0;

    loop {
        let batch: Vec<Event> = remaining.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }
        let len = batch.len();
        batches.push((offset, batch));
        offset += len;
    }

    batches
}
