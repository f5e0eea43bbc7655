//! Normalized record store
//!
//! Append-only sink for the `logs` table plus the watermark query used by
//! discovery.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::NewLogRecord;

#[derive(Clone)]
pub struct LogRecordStore {
    pool: PgPool,
}

impl LogRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one normalized record
    ///
    /// A duplicate id is a no-op, so replaying a partially-ingested file
    /// after a stuck-job reset does not fail on rows already written.
    pub async fn insert(&self, record: &NewLogRecord) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO logs (
                id, timestamp, level, method, url, query, headers, context,
                message, auth_user_id, remote_address, remote_port,
                processing_time_ms, params, raw_data
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(record.timestamp)
        .bind(&record.level)
        .bind(&record.method)
        .bind(&record.url)
        .bind(&record.query)
        .bind(&record.headers)
        .bind(&record.context)
        .bind(&record.message)
        .bind(record.auth_user_id)
        .bind(&record.remote_address)
        .bind(record.remote_port)
        .bind(record.processing_time_ms)
        .bind(&record.params)
        .bind(&record.raw_data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Timestamp of the most recently ingested record, if any
    ///
    /// Discovery uses this as the watermark for filtering candidate keys.
    pub async fn most_recent_timestamp(&self) -> sqlx::Result<Option<DateTime<Utc>>> {
        let row: (Option<DateTime<Utc>>,) =
            sqlx::query_as(r#"SELECT MAX(timestamp) FROM logs"#)
                .fetch_one(&self.pool)
                .await?;

        Ok(row.0)
    }
}
