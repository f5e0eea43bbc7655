//! LDP Ingestor Library
//!
//! Ingests gzip-compressed JSON log batches from an S3-compatible object
//! store into PostgreSQL. Batches are tracked as ingestion jobs with
//! atomic claiming, stuck-job recovery, and per-record fault tolerance,
//! so any number of ingestor instances can run against the same store.
//!
//! # Example
//!
//! ```no_run
//! use ldp_ingestor::config::IngestorConfig;
//! use ldp_ingestor::ingest::IngestScheduler;
//! use ldp_ingestor::storage::{config::StorageConfig, Storage};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestorConfig::load()?;
//!     let pool = ldp_ingestor::db::create_pool(&config.database).await?;
//!     ldp_ingestor::db::run_migrations(&pool).await?;
//!
//!     let storage = Storage::new(StorageConfig::from_env()?).await?;
//!     let scheduler = IngestScheduler::new(pool, storage, config.ingest);
//!
//!     scheduler.run_once("my-log-bucket", Some("logs/")).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod ingest;
pub mod storage;
