//! CLI entrypoint for the `jobrelay-agent` binary.

use std::sync::Arc;

use clap::Parser;
use eyre::{Result, WrapErr};
use jobrelay_protocol::{TokioExecutor, AGENT_PORT};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Listens for a single coordinator at a time and runs whatever commands it
/// configures (§4.5). Takes no flags beyond an optional port override.
#[derive(Debug, Parser)]
#[command(name = "jobrelay-agent", version, about)]
struct Cli {
    /// TCP port to listen on.
    #[arg(long, default_value_t = AGENT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let listener = TcpListener::bind(("0.0.0.0", cli.port))
        .await
        .wrap_err_with(|| format!("failed to bind port {}", cli.port))?;
    info!(port = cli.port, "listening for a coordinator");

    jobrelay_agent::listener::serve(listener, Arc::new(TokioExecutor)).await;
}
