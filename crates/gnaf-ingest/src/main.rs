//! GNAF Ingest - G-NAF PostgreSQL importer

use anyhow::Result;
use clap::Parser;
use gnaf_common::logging::{init_logging, LogConfig, LogLevel};
use gnaf_ingest::{Config, Mode, Pipeline};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gnaf-ingest")]
#[command(author, version, about = "G-NAF PostgreSQL importer")]
struct Cli {
    /// Keep the normalized schema instead of building the flat search table
    #[arg(long)]
    raw: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::from_env(LogConfig::with_level(log_level))?;
    init_logging(&log_config)?;

    let mode = if cli.raw { Mode::Raw } else { Mode::Flat };

    info!("Starting G-NAF PostgreSQL importer");
    let config = Config::load()?;

    let report = Pipeline::new(config, mode).run().await?;

    info!("{}", report.summary());
    Ok(())
}
