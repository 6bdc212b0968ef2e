#![cfg(not(tarpaulin_include))]

use std::path::PathBuf;

use clap::Parser;
use proposal_builder::{ProposalConfig, app};

#[derive(Parser)]
#[command(name = "website", about = "Technical proposal builder web front end")]
struct Args {
    /// Configuration file (defaults to ./proposal.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Main entry point for the web application
///
/// Loads the configuration and serves the proposal form and API until the
/// process is stopped.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ProposalConfig::load(args.config.as_deref())?;

    app::run(config).await
}
