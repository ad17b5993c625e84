//! The coordinator-side result store shared by a test's listeners (§3's
//! `AgentSession.results`, §9's "shared registries... model as a small
//! struct owned by the test instance, with a mutex for its mutable
//! fields").

use std::collections::BTreeMap;
use std::sync::Mutex;

use jobrelay_protocol::Status;

/// One target's result slots, one per job, in the plan's declaration order —
/// `None` until a record (real or synthesized) has been stored (§9: "the
/// iteration order over a target's commands must match the declaration
/// order in the plan for the signoff synthesis to be deterministic").
pub type TargetResults = Vec<Option<(Status, String)>>;

/// All targets' results for one test, keyed by target address.
#[derive(Default)]
pub struct TestResults {
    inner: Mutex<BTreeMap<String, TargetResults>>,
}

impl TestResults {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a target with `job_count` empty slots, ahead of its
    /// listener starting (so the signoff always has something to fill even
    /// if the listener never reads a single byte).
    pub fn register_target(&self, target: &str, job_count: usize) {
        self.inner
            .lock()
            .unwrap()
            .insert(target.to_string(), vec![None; job_count]);
    }

    /// Stores a result for the first still-unset slot in `target` whose job
    /// index matches `command` (first match wins, so duplicate command
    /// strings within a target are assigned in declaration order).
    pub fn store(&self, target: &str, commands: &[String], command: &str, status: Status, output: String) {
        let mut guard = self.inner.lock().unwrap();
        let Some(slots) = guard.get_mut(target) else {
            return;
        };
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() && commands.get(index).is_some_and(|c| c == command) {
                *slot = Some((status, output));
                return;
            }
        }
    }

    /// Signoff (§4.2, §4.3): fills every still-unset slot for `target` with
    /// `(KILLED, "")`, guaranteeing totality.
    pub fn signoff(&self, target: &str) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(slots) = guard.get_mut(target) {
            for slot in slots.iter_mut() {
                if slot.is_none() {
                    *slot = Some((Status::Killed, String::new()));
                }
            }
        }
    }

    /// A snapshot of every target's results, for printing or assertions.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, TargetResults> {
        self.inner.lock().unwrap().clone()
    }
}
