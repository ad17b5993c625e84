//! Coordinator-side errors (§4.2, §7).

use jobrelay_protocol::ProtocolError;
use thiserror::Error;

/// Failure preparing one target (§4.2's prepare phase). Every variant is
/// routed through the abort policy (`handleTimeout`), never surfaced as a
/// fatal error for the whole test.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("connect to {address} timed out")]
    ConnectTimedOut { address: String },
}

/// Errors that abort the whole coordinator process (config loading, CLI).
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("failed to read config file {path}: {source}")]
    ReadConfig {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path} as TOML: {source}")]
    ParseConfig {
        path: String,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("test {label:?} is invalid: {source}")]
    InvalidPlan {
        label: String,
        #[source]
        source: jobrelay_protocol::plan::PlanError,
    },
}
