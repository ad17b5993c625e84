//! CLI entrypoint for the `jobrelay-coordinator` binary.

use clap::Parser;
use eyre::{Result, WrapErr};
use jobrelay_coordinator::cli::Cli;
use jobrelay_coordinator::orchestrator;
use jobrelay_coordinator::transport::Transport;
use jobrelay_coordinator::config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let plans = config::load(&cli.config)
        .await
        .wrap_err_with(|| format!("failed to load config file {}", cli.config))?;

    let transport = if cli.simulate { Transport::Simulated } else { Transport::Tcp };

    orchestrator::run_all(&plans, transport).await;

    Ok(())
}
