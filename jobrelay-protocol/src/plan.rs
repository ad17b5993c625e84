//! The test-plan data model (§3), as produced by the (out-of-scope) config
//! parser and consumed by the coordinator.

use std::collections::BTreeMap;
use std::time::Duration;

/// A timeout value, or the sentinel meaning "no deadline". On the wire this
/// is the integer `0` (§3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Seconds(u64),
    None,
}

impl Timeout {
    /// Converts to the wire representation: the number of seconds, or `0`.
    #[must_use]
    pub const fn as_wire_seconds(self) -> u64 {
        match self {
            Self::Seconds(s) => s,
            Self::None => 0,
        }
    }

    /// Parses the wire representation, where `0` means [`Timeout::None`].
    #[must_use]
    pub const fn from_wire_seconds(seconds: u64) -> Self {
        if seconds == 0 {
            Self::None
        } else {
            Self::Seconds(seconds)
        }
    }

    #[must_use]
    pub const fn as_duration(self) -> Option<Duration> {
        match self {
            Self::Seconds(s) => Some(Duration::from_secs(s)),
            Self::None => None,
        }
    }

    /// The longer of two timeouts, where `None` absorbs (outlives any finite
    /// value) — used to compute a listener's or SOS supervisor's overall
    /// deadline from its constituent per-command timeouts (§3).
    #[must_use]
    pub const fn max(self, other: Self) -> Self {
        match (self, other) {
            (Self::None, _) | (_, Self::None) => Self::None,
            (Self::Seconds(a), Self::Seconds(b)) => Self::Seconds(if a > b { a } else { b }),
        }
    }
}

/// The minimum number of targets whose results are required for a test to be
/// considered non-aborted (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinHosts {
    Count(usize),
    All,
}

/// One (command, timeout) pair scheduled on a target (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub command: String,
    pub timeout: Timeout,
}

impl Job {
    #[must_use]
    pub fn new(command: impl Into<String>, timeout: Timeout) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

/// One agent's address and its ordered list of jobs within a test (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub address: String,
    pub jobs: Vec<Job>,
}

impl Target {
    /// The deadline a coordinator-side listener should apply: the longest of
    /// this target's job timeouts, or `None` if any job has no timeout.
    #[must_use]
    pub fn listener_timeout(&self) -> Timeout {
        self.jobs
            .iter()
            .fold(Timeout::Seconds(0), |acc, job| acc.max(job.timeout))
    }
}

/// One test: a label, an overall default timeout, a minimum-host
/// requirement, and an ordered set of targets (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPlan {
    pub label: String,
    pub general_timeout: Timeout,
    pub min_hosts: MinHosts,
    /// Declaration order is preserved: iteration over a target's commands
    /// must match the plan's order, since the listener signoff (§4.3) relies
    /// on it to deterministically synthesize `KILLED` results.
    pub targets: BTreeMap<String, Target>,
}

/// Errors that make a [`TestPlan`] invalid per §3's invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("test {label:?} has no targets")]
    NoTargets { label: String },
    #[error("test {label:?} target {address:?} has no jobs")]
    NoJobs { label: String, address: String },
    #[error("test {label:?} minhosts ({min_hosts}) exceeds target count ({target_count})")]
    MinHostsExceedsTargets {
        label: String,
        min_hosts: usize,
        target_count: usize,
    },
}

impl TestPlan {
    /// Validates §3's invariants: every target has at least one job, and
    /// `minHosts <= |targets|` unless `minHosts` is `All`.
    ///
    /// # Errors
    /// Returns the first invariant violation found.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.targets.is_empty() {
            return Err(PlanError::NoTargets {
                label: self.label.clone(),
            });
        }
        for (address, target) in &self.targets {
            if target.jobs.is_empty() {
                return Err(PlanError::NoJobs {
                    label: self.label.clone(),
                    address: address.clone(),
                });
            }
        }
        if let MinHosts::Count(min_hosts) = self.min_hosts {
            if min_hosts > self.targets.len() {
                return Err(PlanError::MinHostsExceedsTargets {
                    label: self.label.clone(),
                    min_hosts,
                    target_count: self.targets.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(jobs: Vec<Job>) -> Target {
        Target {
            address: "t1".into(),
            jobs,
        }
    }

    #[test]
    fn timeout_max_absorbs_none() {
        assert_eq!(Timeout::Seconds(5).max(Timeout::None), Timeout::None);
        assert_eq!(Timeout::None.max(Timeout::Seconds(5)), Timeout::None);
        assert_eq!(
            Timeout::Seconds(5).max(Timeout::Seconds(9)),
            Timeout::Seconds(9)
        );
    }

    #[test]
    fn wire_seconds_round_trip() {
        assert_eq!(Timeout::from_wire_seconds(0), Timeout::None);
        assert_eq!(Timeout::from_wire_seconds(7), Timeout::Seconds(7));
        assert_eq!(Timeout::None.as_wire_seconds(), 0);
        assert_eq!(Timeout::Seconds(7).as_wire_seconds(), 7);
    }

    #[test]
    fn listener_timeout_is_the_max_of_its_jobs() {
        let t = target(vec![
            Job::new("a", Timeout::Seconds(3)),
            Job::new("b", Timeout::Seconds(10)),
        ]);
        assert_eq!(t.listener_timeout(), Timeout::Seconds(10));
    }

    #[test]
    fn listener_timeout_is_none_if_any_job_is_unbounded() {
        let t = target(vec![
            Job::new("a", Timeout::Seconds(3)),
            Job::new("b", Timeout::None),
        ]);
        assert_eq!(t.listener_timeout(), Timeout::None);
    }

    #[test]
    fn validate_rejects_empty_targets() {
        let plan = TestPlan {
            label: "t".into(),
            general_timeout: Timeout::None,
            min_hosts: MinHosts::All,
            targets: BTreeMap::new(),
        };
        assert!(matches!(
            plan.validate(),
            Err(PlanError::NoTargets { .. })
        ));
    }

    #[test]
    fn validate_rejects_minhosts_above_target_count() {
        let mut targets = BTreeMap::new();
        targets.insert("t1".into(), target(vec![Job::new("a", Timeout::None)]));
        let plan = TestPlan {
            label: "t".into(),
            general_timeout: Timeout::None,
            min_hosts: MinHosts::Count(2),
            targets,
        };
        assert!(matches!(
            plan.validate(),
            Err(PlanError::MinHostsExceedsTargets { .. })
        ));
    }
}
