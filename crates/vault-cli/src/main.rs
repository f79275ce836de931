//! `filevault`: command-line client entry point.
//!
//! Startup sequence:
//! 1. Parse the command line.
//! 2. Load and validate [`Config`] from environment variables.
//! 3. Initialise structured JSON logging.
//! 4. Connect the S3 payload and record stores and build the protector.
//! 5. Run the requested command.

mod commands;
mod config;
mod telemetry;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use vault_core::store::{JsonRecordStore, S3ObjectStore};
use vault_core::FileProtector;

use commands::Cli;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Command line
    // -----------------------------------------------------------------------
    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 2. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: filevault configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 3. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        bucket = %cfg.s3_bucket,
        max_concurrent = cfg.governor_max_concurrent,
        "filevault starting"
    );

    // -----------------------------------------------------------------------
    // 4. Stores
    // -----------------------------------------------------------------------
    let payloads = S3ObjectStore::connect(
        cfg.s3_bucket.clone(),
        cfg.s3_prefix.clone(),
        cfg.s3_endpoint_url.as_deref(),
    )
    .await;
    let records = JsonRecordStore::new(payloads.with_prefix(""));
    let protector = FileProtector::new(payloads, records, cfg.protector());

    // -----------------------------------------------------------------------
    // 5. Command
    // -----------------------------------------------------------------------
    commands::run(&protector, cli.command).await
}
