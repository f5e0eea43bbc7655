//! Durable job store
//!
//! Every operation that can race between scheduler instances is a single
//! atomic statement: claiming locks rows with `FOR UPDATE SKIP LOCKED`
//! inside one UPDATE, and discovery inserts rely on the `(s3_key, bucket)`
//! primary key rather than a check-then-insert sequence. The `version`
//! column increments on every update.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use super::models::{IngestionJob, NewIngestionJob};

/// Repository of per-file ingestion state
#[derive(Clone)]
pub struct JobStore {
    pool: PgPool,
}

impl JobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically claim up to `page_size` eligible jobs
    ///
    /// Eligible: pending, or processing with a claim older than
    /// `stale_cutoff`. Claimed rows transition to processing with a fresh
    /// `claimed_at`. Oldest jobs first, to bound starvation.
    pub async fn claim_pending_page(
        &self,
        page_size: i64,
        stale_cutoff: DateTime<Utc>,
    ) -> sqlx::Result<Vec<IngestionJob>> {
        let mut jobs: Vec<IngestionJob> = sqlx::query_as(
            r#"
            UPDATE ingestion_jobs AS j
            SET status = 'processing',
                claimed_at = NOW(),
                updated_at = NOW(),
                version = j.version + 1,
                metadata = COALESCE(j.metadata, '{}'::jsonb)
                    || jsonb_build_object('batch_claimed_at', NOW())
            FROM (
                SELECT s3_key, bucket
                FROM ingestion_jobs
                WHERE status = 'pending'
                   OR (status = 'processing' AND claimed_at < $1)
                ORDER BY created_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            ) AS eligible
            WHERE j.s3_key = eligible.s3_key
              AND j.bucket = eligible.bucket
            RETURNING j.s3_key, j.bucket, j.status, j.claimed_at, j.metadata,
                      j.created_at, j.updated_at, j.version
            "#,
        )
        .bind(stale_cutoff)
        .bind(page_size)
        .fetch_all(&self.pool)
        .await?;

        // RETURNING does not preserve the subquery ordering
        jobs.sort_by_key(|job| job.created_at);

        debug!(claimed = jobs.len(), "Claimed pending jobs");

        Ok(jobs)
    }

    /// Mark a job completed, merging diagnostic metadata
    pub async fn mark_completed(
        &self,
        s3_key: &str,
        bucket: &str,
        metadata: serde_json::Value,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET status = 'completed',
                updated_at = NOW(),
                version = version + 1,
                metadata = COALESCE(metadata, '{}'::jsonb) || $3
            WHERE s3_key = $1 AND bucket = $2
            "#,
        )
        .bind(s3_key)
        .bind(bucket)
        .bind(metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark a job failed, capturing the error and attempt time
    pub async fn mark_failed(
        &self,
        s3_key: &str,
        bucket: &str,
        error_message: &str,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET status = 'failed',
                updated_at = NOW(),
                version = version + 1,
                metadata = COALESCE(metadata, '{}'::jsonb)
                    || jsonb_build_object('error', $3::text, 'last_attempt', NOW())
            WHERE s3_key = $1 AND bucket = $2
            "#,
        )
        .bind(s3_key)
        .bind(bucket)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Bulk-insert candidate jobs, skipping keys that already exist
    ///
    /// The primary key decides duplicates, closing the race between two
    /// discovery passes. Returns the number of rows actually inserted.
    pub async fn insert_new_if_absent(&self, jobs: &[NewIngestionJob]) -> sqlx::Result<usize> {
        if jobs.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;

        for job in jobs {
            let result = sqlx::query(
                r#"
                INSERT INTO ingestion_jobs (s3_key, bucket, status)
                VALUES ($1, $2, 'pending')
                ON CONFLICT (s3_key, bucket) DO NOTHING
                "#,
            )
            .bind(&job.s3_key)
            .bind(&job.bucket)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;

        Ok(inserted)
    }

    /// Reset stuck processing jobs back to pending
    ///
    /// Idempotent bulk update, safe to run from any number of instances.
    /// Returns the number of jobs requeued.
    pub async fn reclaim_stuck(&self, stale_cutoff: DateTime<Utc>) -> sqlx::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET status = 'pending',
                claimed_at = NULL,
                updated_at = NOW(),
                version = version + 1,
                metadata = COALESCE(metadata, '{}'::jsonb)
                    || jsonb_build_object('last_stuck_reset', NOW(), 'previous_status', status)
            WHERE status = 'processing' AND claimed_at < $1
            "#,
        )
        .bind(stale_cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Fetch one job row by identity
    pub async fn get(&self, s3_key: &str, bucket: &str) -> sqlx::Result<Option<IngestionJob>> {
        sqlx::query_as(
            r#"
            SELECT s3_key, bucket, status, claimed_at, metadata,
                   created_at, updated_at, version
            FROM ingestion_jobs
            WHERE s3_key = $1 AND bucket = $2
            "#,
        )
        .bind(s3_key)
        .bind(bucket)
        .fetch_optional(&self.pool)
        .await
    }
}
