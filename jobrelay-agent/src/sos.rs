//! The SOS supervisor (§4.6): the single reader of the connection once
//! `RUNNING` begins, watching for `KILL` or its own deadline elapsing and
//! broadcasting the reason to every per-command supervisor.

use jobrelay_protocol::{spawn_frame_reader, ControlToken, Deadline, Timeout};
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tracing::{debug, info};

/// Why the SOS supervisor told every command supervisor to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillReason {
    /// The coordinator sent `KILL`, or closed the connection early.
    Killed,
    /// No command finished before the listener's overall deadline elapsed.
    Timeout,
}

/// Reads from `reader` until `KILL` arrives or `deadline` elapses, then sends
/// the reason on `kill_tx`. Returns once it has done so, or once the channel
/// has no more receivers (every command supervisor already finished).
pub async fn watch_for_kill<R>(reader: R, timeout: Timeout, kill_tx: watch::Sender<Option<KillReason>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut frames = spawn_frame_reader(reader);
    let deadline = Deadline::starting_now(timeout);

    // A remote departure (EOF or read error) that isn't an explicit KILL is
    // a timeout when there's a finite deadline to blame it on, and a kill
    // only when the deadline is NONE (§4.6, §7).
    let departure_reason = if timeout == Timeout::None {
        KillReason::Killed
    } else {
        KillReason::Timeout
    };

    loop {
        if kill_tx.is_closed() {
            return;
        }
        if deadline.has_elapsed() {
            info!("SOS supervisor deadline elapsed, signalling timeout");
            let _ = kill_tx.send(Some(KillReason::Timeout));
            return;
        }

        let wait = deadline.next_wait();
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Some(Ok(Some(bytes))) => {
                        if ControlToken::parse(&bytes) == Some(ControlToken::Kill) {
                            info!("received KILL");
                            let _ = kill_tx.send(Some(KillReason::Killed));
                            return;
                        }
                        debug!("ignoring unexpected message while running");
                    }
                    Some(Ok(None)) | None => {
                        info!(?departure_reason, "connection closed while running");
                        let _ = kill_tx.send(Some(departure_reason));
                        return;
                    }
                    Some(Err(_)) => {
                        info!(?departure_reason, "read error while running");
                        let _ = kill_tx.send(Some(departure_reason));
                        return;
                    }
                }
            }
            () = tokio::time::sleep(wait) => {
                // Readiness tick: loop back and re-check the deadline.
            }
        }
    }
}
