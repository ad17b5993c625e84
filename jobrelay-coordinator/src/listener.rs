//! The per-agent listener (§4.3): demultiplexes one agent's result records
//! from its terminal `DONE`, applies the target's deadline, and performs
//! signoff on exit.

use std::sync::Arc;

use jobrelay_protocol::{spawn_frame_reader, ControlToken, Deadline, ResultRecord, Target};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::abort::AbortPolicy;
use crate::session::TestResults;

/// How a listener stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerOutcome {
    /// Peer sent `DONE`.
    Done,
    /// The target's `listenerTimeout` elapsed with no `DONE`.
    TimedOut,
    /// The test-wide abort policy told every listener to stop.
    Killed,
    /// A read error or early close.
    Failed,
}

/// Runs one target's listener for the duration of a test. Always performs
/// signoff before returning, so every (target, command) pair is guaranteed
/// exactly one stored result by the time this returns.
///
/// `write_half` is shared with the orchestrator, which sends `START` on it
/// once every target's listener has been spawned (§4.2); this task only
/// ever writes a best-effort `KILL` to it.
pub async fn run(
    read_half: OwnedReadHalf,
    write_half: Arc<Mutex<OwnedWriteHalf>>,
    target: &Target,
    test_label: &str,
    results: Arc<TestResults>,
    abort: Arc<AbortPolicy>,
) -> ListenerOutcome {
    let commands: Vec<String> = target.jobs.iter().map(|job| job.command.clone()).collect();
    let deadline = Deadline::starting_now(target.listener_timeout());
    let mut abort_rx = abort.subscribe();

    let mut frames = spawn_frame_reader(read_half);

    let outcome = loop {
        if *abort_rx.borrow() {
            break ListenerOutcome::Killed;
        }
        if deadline.has_elapsed() {
            break ListenerOutcome::TimedOut;
        }

        let wait = deadline.next_wait();
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Some(Ok(Some(bytes))) => {
                        if ControlToken::parse(&bytes) == Some(ControlToken::Done) {
                            break ListenerOutcome::Done;
                        }
                        match ResultRecord::parse(&bytes) {
                            Ok(record) => {
                                info!(
                                    test = %test_label,
                                    target = %record.target,
                                    command = %record.command,
                                    status = %record.status,
                                    "result"
                                );
                                results.store(
                                    &target.address,
                                    &commands,
                                    &record.command,
                                    record.status,
                                    record.output,
                                );
                            }
                            Err(error) => {
                                warn!(%error, target = %target.address, "malformed result record");
                            }
                        }
                    }
                    Some(Ok(None)) | None => break ListenerOutcome::Failed,
                    Some(Err(error)) => {
                        warn!(%error, target = %target.address, "listener read error");
                        break ListenerOutcome::Failed;
                    }
                }
            }
            () = tokio::time::sleep(wait) => {
                // Readiness tick: loop back and re-check deadline/abort.
            }
        }
    };

    if outcome == ListenerOutcome::Killed {
        let mut guard = write_half.lock().await;
        let _ = ControlToken::Kill.send(&mut *guard).await;
    }
    if matches!(outcome, ListenerOutcome::TimedOut | ListenerOutcome::Failed) {
        abort.fail(&target.address);
    }

    results.signoff(&target.address);
    outcome
}
