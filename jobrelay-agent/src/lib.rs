//! The agent (§4.5–4.7): a state machine serving one coordinator connection
//! at a time over TCP, running whatever commands it's configured with and
//! reporting per-command results.

pub mod command_supervisor;
pub mod configure;
pub mod error;
pub mod listener;
pub mod run;
pub mod sos;

pub use error::AgentError;
