//! The abort policy (`handleTimeout`, §4.4): decides, under a single test
//! lock, whether a failing target aborts the whole test or is merely
//! absorbed.

use std::sync::Mutex;

use jobrelay_protocol::MinHosts;
use tokio::sync::watch;
use tracing::warn;

struct AbortState {
    test_aborted: bool,
    /// `None` when `minHosts == ALL` (every failure aborts immediately, so
    /// there's no budget to track); `Some(n)` is how many more failures this
    /// test can absorb before `minHosts` can no longer be met.
    timeouts_remaining: Option<i64>,
}

/// Shared once per test; every per-agent listener calls [`AbortPolicy::fail`]
/// on timeout/error and watches [`AbortPolicy::subscribe`] for the kill
/// broadcast.
pub struct AbortPolicy {
    label: String,
    min_hosts: MinHosts,
    state: Mutex<AbortState>,
    kill_tx: watch::Sender<bool>,
}

impl AbortPolicy {
    #[must_use]
    pub fn new(label: String, min_hosts: MinHosts, target_count: usize) -> Self {
        let timeouts_remaining = match min_hosts {
            MinHosts::All => None,
            MinHosts::Count(min) => Some((target_count.saturating_sub(min)) as i64),
        };
        Self {
            label,
            min_hosts,
            state: Mutex::new(AbortState {
                test_aborted: false,
                timeouts_remaining,
            }),
            kill_tx: watch::channel(false).0,
        }
    }

    /// A fresh receiver of the kill broadcast, for one listener to watch.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.kill_tx.subscribe()
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state.lock().unwrap().test_aborted
    }

    /// Called when a target connection fails, its listener times out, or a
    /// per-listener error fires. Implements §4.4's rules.
    pub fn fail(&self, target: &str) {
        let mut state = self.state.lock().unwrap();
        if state.test_aborted {
            return;
        }

        match self.min_hosts {
            MinHosts::All => {
                warn!(test = %self.label, %target, "test requires all hosts but host timed out");
                state.test_aborted = true;
                drop(state);
                self.stop_and_kill_listeners();
            }
            MinHosts::Count(min) => match state.timeouts_remaining {
                Some(remaining) if remaining < 1 => {
                    warn!(
                        test = %self.label,
                        %target,
                        "too many timeouts; test requires at least {min} host(s)"
                    );
                    state.test_aborted = true;
                    drop(state);
                    self.stop_and_kill_listeners();
                }
                Some(remaining) => {
                    state.timeouts_remaining = Some(remaining - 1);
                }
                None => unreachable!("Count(min_hosts) always sets timeouts_remaining"),
            },
        }
    }

    fn stop_and_kill_listeners(&self) {
        let _ = self.kill_tx.send(true);
    }
}
