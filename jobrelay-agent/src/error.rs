//! Agent-side errors (§4.5, §7).

use jobrelay_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("unrecognized configuration key: {0:?}")]
    UnknownKey(String),

    #[error("invalid timeout value: {0:?}")]
    InvalidTimeout(String),

    #[error("connection closed before configuration completed")]
    ConnectionClosedDuringConfigure,

    #[error("expected START after READY, connection sent something else")]
    ExpectedStart,
}
