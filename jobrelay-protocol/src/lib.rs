//! Wire protocol, status vocabulary, test-plan data model, and local-executor
//! interface shared between the coordinator and the agent.
//!
//! This crate is the "leaves first" layer of the system: it has no notion of
//! TCP connections, orchestration, or subprocess supervision. It only defines
//! the bytes that cross the wire and the types both sides agree on.

pub mod deadline;
pub mod error;
pub mod executor;
pub mod plan;
pub mod status;
pub mod wire;

pub use deadline::Deadline;
pub use error::ProtocolError;
pub use executor::{CommandOutcome, LocalExecutor, TokioExecutor};
pub use plan::{Job, MinHosts, Target, TestPlan, Timeout};
pub use status::Status;
pub use wire::{spawn_frame_reader, ControlToken, KeyValue, ResultRecord, MAX_RECORD_BYTES};

/// TCP port agents listen on by default.
pub const AGENT_PORT: u16 = 16192;

/// Connect/read timeout used by the coordinator while preparing an agent.
pub const SOCKET_TIMEOUT_SECS: u64 = 60;

/// Readiness-wait granularity used by listeners and supervisors; every
/// "blocking" wait in this system yields at least this often.
pub const POLL_INTERVAL_SECS: u64 = 1;
