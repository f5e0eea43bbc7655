//! LDP Ingestor - log ingestion service

use anyhow::Result;
use clap::{Parser, Subcommand};
use ldp_common::logging::{init_logging, LogConfig, LogLevel};
use ldp_ingestor::config::IngestorConfig;
use ldp_ingestor::ingest::IngestScheduler;
use ldp_ingestor::storage::{config::StorageConfig, Storage};
use std::process;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "ldp-ingestor")]
#[command(author, version, about = "LDP log ingestion service")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process log files from the object store once
    ProcessFiles {
        /// Bucket holding the log batches
        #[arg(short, long)]
        bucket: String,

        /// Optional key prefix to filter files
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Continuously watch for new log files
    Watch {
        /// Bucket holding the log batches
        #[arg(short, long)]
        bucket: String,

        /// Optional key prefix to filter files
        #[arg(short, long)]
        prefix: Option<String>,

        /// Check interval in seconds
        #[arg(short, long, default_value_t = 60)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("ldp-ingestor".to_string())
        .build();

    // Environment variables take precedence
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    let _ = init_logging(&log_config);

    if let Err(e) = run(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = IngestorConfig::load()?;
    let storage_config = StorageConfig::from_env()?;

    let pool = ldp_ingestor::db::create_pool(&config.database).await?;
    ldp_ingestor::db::run_migrations(&pool).await?;

    let storage = Storage::new(storage_config).await?;
    let scheduler = IngestScheduler::new(pool, storage, config.ingest);

    match cli.command {
        Command::ProcessFiles { bucket, prefix } => {
            scheduler.run_once(&bucket, prefix.as_deref()).await?;
        }
        Command::Watch {
            bucket,
            prefix,
            interval,
        } => {
            watch(&scheduler, &bucket, prefix.as_deref(), interval).await;
        }
    }

    Ok(())
}

/// Run a pass immediately, then on every interval tick until a
/// termination signal arrives. Pass failures are logged, not fatal; the
/// in-flight pass finishes before the process exits.
async fn watch(scheduler: &IngestScheduler, bucket: &str, prefix: Option<&str>, interval: u64) {
    info!(bucket, interval, "Starting watch mode");

    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = scheduler.run_once(bucket, prefix).await {
                    error!(error = %e, "Ingestion pass failed");
                }
            }
            _ = &mut shutdown => {
                info!("Shutting down watch mode");
                break;
            }
        }
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
