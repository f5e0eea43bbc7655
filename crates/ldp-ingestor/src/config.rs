//! Configuration management

use serde::{Deserialize, Serialize};

// ============================================================================
// Ingestor Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/ldp";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default number of jobs claimed per page.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Default staleness threshold for stuck-job reclamation (5 minutes).
pub const DEFAULT_STALE_AFTER_SECS: u64 = 300;

/// Default number of decompression attempts per file.
pub const DEFAULT_DECOMPRESS_ATTEMPTS: u32 = 3;

/// Default delay between decompression attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// Ingestor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestorConfig {
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Ingestion pass configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Jobs claimed per page while draining pending work
    pub page_size: i64,
    /// Age after which a processing job is considered stuck
    pub stale_after_secs: u64,
    /// Attempts per file before a corrupt gzip stream is fatal
    pub decompress_attempts: u32,
    /// Delay between decompression attempts
    pub retry_delay_secs: u64,
}

impl IngestorConfig {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = IngestorConfig {
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: std::env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
                idle_timeout_secs: std::env::var("DATABASE_IDLE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
            },
            ingest: IngestConfig {
                page_size: std::env::var("LDP_PAGE_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_PAGE_SIZE),
                stale_after_secs: std::env::var("LDP_STALE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_STALE_AFTER_SECS),
                decompress_attempts: std::env::var("LDP_DECOMPRESS_ATTEMPTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DECOMPRESS_ATTEMPTS),
                retry_delay_secs: std::env::var("LDP_RETRY_DELAY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_DELAY_SECS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.ingest.page_size <= 0 {
            anyhow::bail!("Page size must be greater than 0");
        }

        if self.ingest.stale_after_secs == 0 {
            anyhow::bail!("Stale timeout must be greater than 0");
        }

        if self.ingest.decompress_attempts == 0 {
            anyhow::bail!("Decompress attempts must be greater than 0");
        }

        Ok(())
    }
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            ingest: IngestConfig::default(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
            decompress_attempts: DEFAULT_DECOMPRESS_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = IngestorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ingest.page_size, 50);
        assert_eq!(config.ingest.stale_after_secs, 300);
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let mut config = IngestorConfig::default();
        config.ingest.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_pool_bounds() {
        let mut config = IngestorConfig::default();
        config.database.min_connections = 20;
        config.database.max_connections = 5;
        assert!(config.validate().is_err());
    }
}
