//! Command-line interface definition for the coordinator (§6's "CLI surface
//! of surrounding collaborators" — not part of the protocol core, but still
//! needed for a runnable binary).

use clap::Parser;

/// Drives a sequence of test plans across remote agents.
#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    /// Path to the TOML config file describing the tests to run.
    pub config: String,

    /// Run in simulator mode: no TCP connections are attempted.
    #[arg(short, long)]
    pub simulate: bool,

    /// Verbose logging (raises the tracing filter to debug).
    #[arg(short, long)]
    pub verbose: bool,
}
