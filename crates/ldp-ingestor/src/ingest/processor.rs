//! File processor
//!
//! Turns one claimed job into normalized records: fetch, decompress with
//! retry, parse the batch, normalize and persist record by record.

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::decompress::decompress_gzip;
use super::normalize::normalize;
use super::records::LogRecordStore;
use super::retry::RetryPolicy;
use crate::storage::Storage;

/// Job-level processing failure
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Object store fetch failed; not retryable at this level
    #[error("failed to fetch object: {0:#}")]
    Fetch(anyhow::Error),

    /// Corrupt or truncated gzip stream; the one retryable class
    #[error("corrupt gzip stream: {0}")]
    CorruptStream(#[from] std::io::Error),

    /// The batch container itself is not a valid JSON array
    #[error("malformed log batch: {0}")]
    MalformedBatch(#[from] serde_json::Error),

    /// Record persistence failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ProcessError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessError::CorruptStream(_))
    }
}

/// Counters for one processed file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub records_ingested: usize,
    pub records_skipped: usize,
}

/// Processes one claimed job at a time; records are handled strictly
/// sequentially within a file.
#[derive(Clone)]
pub struct FileProcessor {
    storage: Storage,
    records: LogRecordStore,
    retry: RetryPolicy,
}

impl FileProcessor {
    pub fn new(storage: Storage, records: LogRecordStore, retry: RetryPolicy) -> Self {
        Self {
            storage,
            records,
            retry,
        }
    }

    /// Ingest one file from the object store
    pub async fn process(&self, bucket: &str, key: &str) -> Result<ProcessOutcome, ProcessError> {
        // Each attempt re-fetches the object, so a transiently corrupted
        // download can heal on retry.
        let data = self
            .retry
            .run(
                || async move {
                    let bytes = self
                        .storage
                        .get_content(bucket, key)
                        .await
                        .map_err(ProcessError::Fetch)?;
                    decompress_gzip(&bytes).map_err(ProcessError::from)
                },
                ProcessError::is_retryable,
            )
            .await?;

        let raw_records: Vec<Value> = serde_json::from_slice(&data)?;

        info!(
            bucket,
            key,
            records = raw_records.len(),
            "Parsed log batch"
        );

        let mut outcome = ProcessOutcome::default();

        for raw in &raw_records {
            match normalize(raw) {
                Ok(record) => {
                    self.records.insert(&record).await?;
                    outcome.records_ingested += 1;
                }
                Err(reason) => {
                    // A single bad record never fails the batch
                    warn!(bucket, key, error = %reason, "Skipping log record");
                    outcome.records_skipped += 1;
                }
            }
        }

        info!(
            bucket,
            key,
            ingested = outcome.records_ingested,
            skipped = outcome.records_skipped,
            "File processed"
        );

        Ok(outcome)
    }
}
