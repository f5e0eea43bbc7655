//! Shared test utilities for ingestor integration tests
//!
//! Spins up PostgreSQL and MinIO containers so the scheduler can be
//! exercised against real collaborators. Each test gets its own
//! containers; nothing is shared between tests.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestEnvironment;
//!
//! #[tokio::test]
//! async fn test_with_full_environment() {
//!     let env = TestEnvironment::start().await.expect("environment");
//!
//!     env.upload("2024-01-02T00:00:00.000Z.json.gz", vec![]).await.unwrap();
//!     sqlx::query("SELECT 1").execute(env.pool()).await.unwrap();
//! }
//! ```

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use flate2::write::GzEncoder;
use flate2::Compression;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::io::Write;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use testcontainers_modules::postgres::Postgres;
use tracing::info;

use ldp_ingestor::storage::{config::StorageConfig, Storage};

/// Bucket created for every test environment
pub const TEST_BUCKET: &str = "ldp-test-logs";

/// Default MinIO credentials
pub const MINIO_ACCESS_KEY: &str = "minioadmin";
pub const MINIO_SECRET_KEY: &str = "minioadmin";

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL container with the ingestor migrations applied
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get PostgreSQL host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get PostgreSQL port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// MinIO Test Container
// ============================================================================

/// MinIO container with the test bucket created
pub struct TestMinio {
    _container: ContainerAsync<GenericImage>,
    client: S3Client,
    endpoint: String,
}

impl TestMinio {
    pub async fn start() -> Result<Self> {
        info!("Starting MinIO test container...");

        let container = GenericImage::new("minio/minio", "latest")
            .with_exposed_port(9000.tcp())
            .with_wait_for(WaitFor::message_on_stdout("MinIO Object Storage Server"))
            .with_env_var("MINIO_ROOT_USER", MINIO_ACCESS_KEY)
            .with_env_var("MINIO_ROOT_PASSWORD", MINIO_SECRET_KEY)
            .with_cmd(vec!["server", "/data"])
            .start()
            .await
            .context("Failed to start MinIO container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get MinIO host")?;
        let port = container
            .get_host_port_ipv4(9000.tcp())
            .await
            .context("Failed to get MinIO port")?;

        let endpoint = format!("http://{}:{}", host, port);

        let s3_config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(&endpoint)
            .region(aws_config::Region::new("us-east-1"))
            .credentials_provider(aws_credential_types::Credentials::new(
                MINIO_ACCESS_KEY,
                MINIO_SECRET_KEY,
                None,
                None,
                "static",
            ))
            .load()
            .await;

        // MinIO needs path-style addressing
        let client = S3Client::from_conf(
            aws_sdk_s3::config::Builder::from(&s3_config)
                .force_path_style(true)
                .build(),
        );

        client
            .create_bucket()
            .bucket(TEST_BUCKET)
            .send()
            .await
            .context("Failed to create test bucket")?;

        Ok(Self {
            _container: container,
            client,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upload bytes to the test bucket
    pub async fn upload(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(TEST_BUCKET)
            .key(key)
            .body(data.into())
            .send()
            .await
            .context("Failed to upload to MinIO")?;
        Ok(())
    }
}

// ============================================================================
// Complete Test Environment
// ============================================================================

/// PostgreSQL + MinIO, ready for scheduler runs
pub struct TestEnvironment {
    postgres: TestPostgres,
    minio: TestMinio,
}

impl TestEnvironment {
    pub async fn start() -> Result<Self> {
        // Start both containers in parallel for faster startup
        let (postgres, minio) = tokio::try_join!(TestPostgres::start(), TestMinio::start())?;

        info!("Test environment ready");

        Ok(Self { postgres, minio })
    }

    pub fn pool(&self) -> &PgPool {
        self.postgres.pool()
    }

    pub async fn upload(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.minio.upload(key, data).await
    }

    /// Storage client pointed at the MinIO container
    pub async fn storage(&self) -> Result<Storage> {
        Storage::new(StorageConfig::for_minio(self.minio.endpoint())).await
    }
}

/// Gzip a JSON value the way log batches are stored
pub fn gzip_json(value: &serde_json::Value) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(value.to_string().as_bytes())
        .expect("gzip write");
    encoder.finish().expect("gzip finish")
}
