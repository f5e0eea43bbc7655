//! Error types for LDP

use thiserror::Error;

/// Result type alias for LDP operations
pub type Result<T> = std::result::Result<T, LdpError>;

/// Main error type for LDP
#[derive(Error, Debug)]
pub enum LdpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
