//! LDP Common Library
//!
//! Shared error handling and logging setup for the LDP workspace.
//!
//! # Overview
//!
//! This crate provides functionality used across all LDP workspace members:
//!
//! - **Error Handling**: the [`LdpError`] type and [`Result`] alias
//! - **Logging**: tracing subscriber configuration and initialization
//!
//! # Example
//!
//! ```no_run
//! use ldp_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env().unwrap_or_default();
//!     init_logging(&config)?;
//!     tracing::info!("Application started");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{LdpError, Result};
