//! Data models for ingestion
//!
//! Job rows tracked in `ingestion_jobs` and the normalized record shape
//! written to `logs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ingestion job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal states are never claimed again by the scheduler
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

// Stored as TEXT; decode goes through FromStr so an unexpected value
// surfaces as a column decode error instead of a silent default.
impl sqlx::Type<sqlx::Postgres> for JobStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for JobStatus {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        s.parse().map_err(|e: anyhow::Error| e.into())
    }
}

/// Ingestion job (maps to ingestion_jobs table)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IngestionJob {
    pub s3_key: String,
    pub bucket: String,
    pub status: JobStatus,
    pub claimed_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

/// Candidate job produced by discovery, before insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIngestionJob {
    pub s3_key: String,
    pub bucket: String,
}

/// Normalized log record, ready for insertion into the logs table
///
/// Produced only by the normalizer; immutable once persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLogRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub method: String,
    pub url: String,
    pub query: Option<String>,
    pub headers: serde_json::Value,
    pub context: String,
    pub message: String,
    pub auth_user_id: Option<i64>,
    pub remote_address: String,
    pub remote_port: i32,
    pub processing_time_ms: Option<i64>,
    pub params: Option<serde_json::Value>,
    /// Complete original record, preserved verbatim
    pub raw_data: serde_json::Value,
}
