//! Ingestion scheduler
//!
//! One `run_once` pass: requeue stuck jobs, drain pending work page by
//! page, and only when nothing was pending, discover new object-store keys
//! beyond the record watermark and drain the jobs they become.
//!
//! Any number of scheduler instances may run passes concurrently against
//! the same store; correctness rests on the job store's atomic claim and
//! the uniqueness constraint, not on in-process locking.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info, warn};

use super::jobs::JobStore;
use super::models::NewIngestionJob;
use super::processor::FileProcessor;
use super::records::LogRecordStore;
use super::retry::RetryPolicy;
use crate::config::IngestConfig;
use crate::storage::{Storage, COMPRESSED_JSON_SUFFIX};

/// Summary of one ingestion pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub files_discovered: usize,
}

/// Orchestrates ingestion passes over the job store
pub struct IngestScheduler {
    jobs: JobStore,
    records: LogRecordStore,
    storage: Storage,
    processor: FileProcessor,
    config: IngestConfig,
}

impl IngestScheduler {
    pub fn new(pool: PgPool, storage: Storage, config: IngestConfig) -> Self {
        let jobs = JobStore::new(pool.clone());
        let records = LogRecordStore::new(pool);
        let retry = RetryPolicy::new(
            config.decompress_attempts,
            Duration::from_secs(config.retry_delay_secs),
        );
        let processor = FileProcessor::new(storage.clone(), records.clone(), retry);

        Self {
            jobs,
            records,
            storage,
            processor,
            config,
        }
    }

    /// Run one ingestion pass
    ///
    /// Only store-level failures propagate; individual job failures are
    /// recorded on the job row and counted in the returned stats.
    pub async fn run_once(&self, bucket: &str, prefix: Option<&str>) -> Result<PassStats> {
        // Best effort: a reclamation failure must not block draining or
        // discovery.
        match self.jobs.reclaim_stuck(self.stale_cutoff()).await {
            Ok(0) => {}
            Ok(requeued) => info!(requeued, "Requeued stuck jobs"),
            Err(e) => warn!(error = %e, "Stuck job reclamation failed"),
        }

        let mut stats = PassStats::default();

        loop {
            let processed = self.drain_pending(&mut stats).await?;
            if processed > 0 {
                break;
            }

            // Discovery runs at most once per pass, and only when no
            // pending work existed.
            if stats.files_discovered > 0 {
                break;
            }

            let inserted = self.discover_new_files(bucket, prefix, &mut stats).await?;
            if inserted == 0 {
                break;
            }
        }

        info!(
            succeeded = stats.jobs_succeeded,
            failed = stats.jobs_failed,
            discovered = stats.files_discovered,
            "Ingestion pass complete"
        );

        Ok(stats)
    }

    /// Claim and process pages until an empty page comes back
    ///
    /// Returns the number of jobs handled, successful or not.
    async fn drain_pending(&self, stats: &mut PassStats) -> Result<u64> {
        let mut processed = 0u64;

        loop {
            let jobs = self
                .jobs
                .claim_pending_page(self.config.page_size, self.stale_cutoff())
                .await
                .context("Failed to claim pending jobs")?;

            if jobs.is_empty() {
                break;
            }

            for job in jobs {
                processed += 1;

                match self.processor.process(&job.bucket, &job.s3_key).await {
                    Ok(outcome) => {
                        let mut metadata = json!({
                            "records_ingested": outcome.records_ingested,
                            "records_skipped": outcome.records_skipped,
                        });
                        if let Ok(size) = self.storage.get_size(&job.bucket, &job.s3_key).await {
                            metadata["size_bytes"] = size.into();
                        }

                        self.jobs
                            .mark_completed(&job.s3_key, &job.bucket, metadata)
                            .await
                            .context("Failed to mark job completed")?;

                        stats.jobs_succeeded += 1;
                        info!(bucket = %job.bucket, key = %job.s3_key, "Processed file");
                    }
                    Err(e) => {
                        // The failure is recorded durably; the pass moves on
                        error!(bucket = %job.bucket, key = %job.s3_key, error = %e, "Failed to process file");

                        self.jobs
                            .mark_failed(&job.s3_key, &job.bucket, &e.to_string())
                            .await
                            .context("Failed to mark job failed")?;

                        stats.jobs_failed += 1;
                    }
                }
            }
        }

        Ok(processed)
    }

    /// List keys beyond the watermark and enqueue them as pending jobs
    async fn discover_new_files(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        stats: &mut PassStats,
    ) -> Result<usize> {
        let keys = self
            .storage
            .list_keys(bucket, prefix)
            .await
            .context("Failed to list object store keys")?;

        info!(count = keys.len(), bucket, "Listed candidate files");

        let watermark = self
            .records
            .most_recent_timestamp()
            .await
            .context("Failed to read ingestion watermark")?;

        let candidates: Vec<NewIngestionJob> = keys
            .into_iter()
            .filter(|key| is_newer_than_watermark(key, watermark))
            .map(|s3_key| NewIngestionJob {
                s3_key,
                bucket: bucket.to_string(),
            })
            .collect();

        if candidates.is_empty() {
            info!("No new files to ingest");
            return Ok(0);
        }

        let inserted = self
            .jobs
            .insert_new_if_absent(&candidates)
            .await
            .context("Failed to enqueue discovered files")?;

        stats.files_discovered += inserted;

        info!(
            candidates = candidates.len(),
            inserted, "Enqueued new ingestion jobs"
        );

        Ok(inserted)
    }

    fn stale_cutoff(&self) -> DateTime<Utc> {
        Utc::now() - ChronoDuration::seconds(self.config.stale_after_secs as i64)
    }
}

/// Keep keys strictly newer than the watermark
///
/// A key whose embedded timestamp cannot be parsed has unknown recency, so
/// it is included; the job store's uniqueness constraint makes the extra
/// insert a no-op if the key was already seen.
fn is_newer_than_watermark(key: &str, watermark: Option<DateTime<Utc>>) -> bool {
    let Some(watermark) = watermark else {
        return true;
    };

    match timestamp_from_key(key) {
        Some(ts) => ts > watermark,
        None => {
            warn!(key, "Could not parse timestamp from key, including it");
            true
        }
    }
}

/// Extract the RFC 3339 timestamp embedded in a key's filename
///
/// Keys look like `some/prefix/2024-01-02T00:00:00.000Z.json.gz`.
fn timestamp_from_key(key: &str) -> Option<DateTime<Utc>> {
    let filename = key.rsplit('/').next().unwrap_or(key);
    let stem = filename
        .strip_suffix(COMPRESSED_JSON_SUFFIX)
        .unwrap_or(filename);

    DateTime::parse_from_rfc3339(stem)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
