//! Ingestion core
//!
//! Job scheduling, file processing, and record normalization for the
//! S3 → PostgreSQL log pipeline.

pub mod decompress;
pub mod jobs;
pub mod models;
pub mod normalize;
pub mod processor;
pub mod records;
pub mod retry;
pub mod scheduler;

pub use jobs::JobStore;
pub use models::{IngestionJob, JobStatus, NewIngestionJob, NewLogRecord};
pub use processor::{FileProcessor, ProcessError, ProcessOutcome};
pub use records::LogRecordStore;
pub use retry::RetryPolicy;
pub use scheduler::{IngestScheduler, PassStats};
