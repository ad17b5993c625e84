//! The per-command supervisor (§4.7): spawns one job, races its natural
//! completion against its own timeout and the SOS supervisor's kill signal,
//! and sends exactly one result record.

use std::sync::Arc;

use jobrelay_protocol::{Deadline, Job, LocalExecutor, ResultRecord, Status};
use tokio::io::AsyncWrite;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::sos::KillReason;

/// Runs `job` to completion (or until killed/timed out) and writes its
/// result record through `writer`, serialized against concurrent siblings.
pub async fn run<W>(
    target: &str,
    job: &Job,
    executor: &dyn LocalExecutor,
    mut kill_rx: watch::Receiver<Option<KillReason>>,
    writer: Arc<Mutex<W>>,
) where
    W: AsyncWrite + Unpin,
{
    let mut spawned = match executor.spawn(&job.command) {
        Ok(spawned) => spawned,
        Err(error) => {
            warn!(command = %job.command, %error, "failed to spawn command");
            let record = ResultRecord::new(target, &job.command, Status::Error, error.to_string());
            write_record(&writer, record).await;
            return;
        }
    };

    let deadline = Deadline::starting_now(job.timeout);

    let (exit_code, reason) = loop {
        if let Some(reason) = *kill_rx.borrow() {
            let code = spawned.terminate().await;
            break (code, Some(reason));
        }
        if deadline.has_elapsed() {
            let code = spawned.terminate().await;
            break (code, Some(KillReason::Timeout));
        }

        tokio::select! {
            result = spawned.wait() => {
                let code = result.ok().and_then(|status| status.code());
                break (code, None);
            }
            _ = tokio::time::sleep(deadline.next_wait()) => {
                // Readiness tick: loop back to re-check deadline/kill_rx.
            }
            _ = kill_rx.changed() => {
                // Either a reason arrived (picked up by the loop's top
                // check) or the sender dropped; either way, loop back.
            }
        }
    };

    let outcome = spawned.into_outcome(exit_code).await;
    let status = match reason {
        Some(KillReason::Killed) => Status::Killed,
        Some(KillReason::Timeout) => Status::Timeout,
        None if outcome.exit_code == Some(0) && outcome.stderr.is_empty() => Status::Success,
        None => Status::Error,
    };
    let output = match status {
        Status::Success => outcome.stdout_string(),
        Status::Error => outcome.stderr_string(),
        Status::Timeout | Status::Killed => String::new(),
    };

    info!(command = %job.command, %status, "command finished");
    let record = ResultRecord::new(target, &job.command, status, output);
    write_record(&writer, record).await;
}

async fn write_record<W: AsyncWrite + Unpin>(writer: &Arc<Mutex<W>>, record: ResultRecord) {
    use tokio::io::AsyncWriteExt;

    let bytes = record.encode();
    let mut guard = writer.lock().await;
    if let Err(error) = guard.write_all(&bytes).await {
        warn!(%error, "failed to send result record");
    }
}
