//! The driving loop: lines in, groups out
//!
//! Reads lines in order, skips everything up to the resume row, filters
//! events, and hands each full group to a [`GroupUploader`]. Groups are
//! strictly sequential: the next group is not started until the previous
//! upload returned.

use crate::batch::GroupUploader;
use crate::config::ImportConfig;
use crate::event::Event;
use evimport_common::{ImportError, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Lines read from the source, including skipped ones
    pub rows_read: u64,
    /// Lines at or before the resume row
    pub rows_skipped: u64,
    /// Events dropped by the acceptance filter
    pub events_filtered: u64,
    pub events_uploaded: u64,
    pub groups_uploaded: u64,
}

pub struct IngestionLoop<U> {
    uploader: U,
    group_size: usize,
    group_pause: Duration,
}

impl<U: GroupUploader> IngestionLoop<U> {
    pub fn new(uploader: U, config: &ImportConfig) -> Self {
        Self::with_grouping(uploader, config.group_size, config.group_pause())
    }

    pub fn with_grouping(uploader: U, group_size: usize, group_pause: Duration) -> Self {
        Self {
            uploader,
            group_size: group_size.max(1),
            group_pause,
        }
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    /// Consume `lines` and upload every accepted event
    ///
    /// Rows are numbered from 1. Rows up to and including `start_row` are
    /// skipped without being decoded. Any later line that is not valid JSON,
    /// blank lines included, ends the run with [`ImportError::Parse`].
    pub async fn run<I>(&self, lines: I, start_row: u64) -> Result<IngestSummary>
    where
        I: IntoIterator<Item = std::io::Result<String>>,
    {
        let mut summary = IngestSummary::default();
        let mut group = Vec::with_capacity(self.group_size);
        let mut row = 0u64;

        for line in lines {
            let line = line?;
            row += 1;
            summary.rows_read += 1;

            if row <= start_row {
                summary.rows_skipped += 1;
                continue;
            }

            match Event::decode(&line, row)? {
                Some(event) => group.push(event),
                None => {
                    summary.events_filtered += 1;
                    continue;
                },
            }

            if group.len() >= self.group_size {
                let full = std::mem::replace(&mut group, Vec::with_capacity(self.group_size));
                self.flush(full, row, &mut summary).await?;
                tokio::time::sleep(self.group_pause).await;
            }
        }

        if !group.is_empty() {
            self.flush(group, row, &mut summary).await?;
        }

        info!(
            rows_read = summary.rows_read,
            rows_skipped = summary.rows_skipped,
            events_filtered = summary.events_filtered,
            events_uploaded = summary.events_uploaded,
            groups_uploaded = summary.groups_uploaded,
            "Ingestion finished"
        );

        Ok(summary)
    }

    async fn flush(&self, group: Vec<Event>, row: u64, summary: &mut IngestSummary) -> Result<()> {
        let size = group.len() as u64;
        info!(events = size, row, "uploading {} events, row {}", size, row);

        self.uploader
            .upload(group, row)
            .await
            .map_err(|e| ImportError::upload(format!("group ending at row {}: {}", row, e)))?;

        summary.events_uploaded += size;
        summary.groups_uploaded += 1;
        debug!(groups = summary.groups_uploaded, "Group complete");
        Ok(())
    }
}
