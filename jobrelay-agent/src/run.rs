//! `READY` → `RUNNING` → `DRAINING` (§4.5–§4.7): wait for `START`, fan the
//! configured jobs out to per-command supervisors, and send `DONE` once
//! they've all finished.

use std::sync::Arc;

use jobrelay_protocol::{wire::read_frame, ControlToken, Job, LocalExecutor, Timeout};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tracing::info;

use crate::command_supervisor;
use crate::error::AgentError;
use crate::sos;

/// Reads the next frame off `stream` and confirms it is `START`. Any other
/// message is a protocol error (§7): the caller closes the connection.
///
/// # Errors
/// Returns [`AgentError::ConnectionClosedDuringConfigure`] on EOF, or
/// [`AgentError::ExpectedStart`] if the message wasn't `START`.
pub async fn await_start<S>(stream: &mut S) -> Result<(), AgentError>
where
    S: AsyncRead + Unpin,
{
    let frame = read_frame(stream)
        .await?
        .ok_or(AgentError::ConnectionClosedDuringConfigure)?;
    if ControlToken::parse(&frame) == Some(ControlToken::Start) {
        Ok(())
    } else {
        Err(AgentError::ExpectedStart)
    }
}

/// Computes the SOS supervisor's deadline: the longest of the run's job
/// timeouts (§3's `Target::listener_timeout`, mirrored locally since the
/// agent only sees its own jobs, not a full `Target`).
fn sos_timeout(jobs: &[Job]) -> Timeout {
    jobs.iter()
        .fold(Timeout::Seconds(0), |acc, job| acc.max(job.timeout))
}

/// Runs the `RUNNING` phase to completion over an owned `TcpStream`: splits
/// the connection, starts the SOS supervisor and one supervisor per job,
/// waits for them all, then sends `DONE`.
///
/// # Errors
/// Returns an error if the final `DONE` write fails.
pub async fn run(
    stream: TcpStream,
    peer_name: String,
    jobs: Vec<Job>,
    executor: Arc<dyn LocalExecutor>,
) -> Result<(), AgentError> {
    let (read_half, write_half) = stream.into_split();
    let writer = Arc::new(Mutex::new(write_half));
    let (kill_tx, kill_rx) = watch::channel(None);

    let sos_handle = tokio::spawn(sos::watch_for_kill(read_half, sos_timeout(&jobs), kill_tx));

    let mut supervisors = Vec::with_capacity(jobs.len());
    for job in jobs {
        let target = peer_name.clone();
        let executor = executor.clone();
        let kill_rx = kill_rx.clone();
        let writer = writer.clone();
        supervisors.push(tokio::spawn(async move {
            command_supervisor::run(&target, &job, executor.as_ref(), kill_rx, writer).await;
        }));
    }

    for supervisor in supervisors {
        let _ = supervisor.await;
    }

    sos_handle.abort();

    info!(target = %peer_name, "all commands finished, sending DONE");
    let mut guard = writer.lock().await;
    ControlToken::Done.send(&mut *guard).await?;
    guard.flush().await?;
    drop(guard);

    Ok(())
}
