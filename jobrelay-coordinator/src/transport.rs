//! The real-vs-simulated connection policy (§9's design note: "Simulation
//! mode is a policy flag that substitutes a no-op transport for real TCP;
//! the orchestrator is unaware of the substitution").
//!
//! `Transport::connect` is the orchestrator's only door into the network.
//! [`Transport::Simulated`] always fails to connect, so every target in
//! simulated mode takes exactly the same "this agent didn't respond" path
//! through [`crate::abort::AbortPolicy`] that a real connection failure
//! would — simulate mode is a dry run of the abort/minhosts machinery and
//! the config file, not a fake agent.

use std::time::Duration;

use jobrelay_protocol::{AGENT_PORT, SOCKET_TIMEOUT_SECS};
use tokio::net::TcpStream;

use crate::error::PrepareError;

/// Whether the coordinator opens real TCP connections, or none at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Simulated,
}

impl Transport {
    /// Connects to `address` on [`AGENT_PORT`] with a
    /// [`SOCKET_TIMEOUT_SECS`]-second timeout (§4.2, §6).
    ///
    /// # Errors
    /// Returns [`PrepareError::Connect`] or [`PrepareError::ConnectTimedOut`]
    /// on failure. Always fails when `self` is [`Transport::Simulated`].
    pub async fn connect(self, address: &str) -> Result<TcpStream, PrepareError> {
        match self {
            Self::Simulated => Err(PrepareError::Connect {
                address: address.to_string(),
                source: std::io::Error::other("simulated mode: no connection attempted"),
            }),
            Self::Tcp => {
                let endpoint = format!("{address}:{AGENT_PORT}");
                tokio::time::timeout(
                    Duration::from_secs(SOCKET_TIMEOUT_SECS),
                    TcpStream::connect(&endpoint),
                )
                .await
                .map_err(|_| PrepareError::ConnectTimedOut {
                    address: address.to_string(),
                })?
                .map_err(|source| PrepareError::Connect {
                    address: address.to_string(),
                    source,
                })
            }
        }
    }
}
