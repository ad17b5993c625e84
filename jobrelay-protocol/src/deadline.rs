//! Wall-clock deadline abstraction (§5): every "blocking" wait in this
//! system yields at a readiness checkpoint at least once per
//! [`crate::POLL_INTERVAL_SECS`], whether or not it has a finite deadline.

use std::time::Duration;
use tokio::time::Instant;

use crate::plan::Timeout;

/// A point in time after which a wait should give up, or `None` for "never".
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Starts a deadline `timeout` from now. [`Timeout::None`] never expires.
    #[must_use]
    pub fn starting_now(timeout: Timeout) -> Self {
        Self {
            at: timeout.as_duration().map(|d| Instant::now() + d),
        }
    }

    /// A deadline that never expires.
    #[must_use]
    pub const fn never() -> Self {
        Self { at: None }
    }

    /// Whether `Instant::now()` is at or past this deadline. Always `false`
    /// for [`Deadline::never`].
    #[must_use]
    pub fn has_elapsed(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// How long until this deadline elapses, clamped to at most
    /// [`crate::POLL_INTERVAL_SECS`] so callers always re-check readiness on
    /// that cadence instead of sleeping straight through to expiry.
    #[must_use]
    pub fn next_wait(&self) -> Duration {
        let poll_interval = Duration::from_secs(crate::POLL_INTERVAL_SECS);
        match self.at {
            None => poll_interval,
            Some(at) => {
                let remaining = at.saturating_duration_since(Instant::now());
                remaining.min(poll_interval)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_has_not_elapsed() {
        assert!(!Deadline::never().has_elapsed());
    }

    #[test]
    fn zero_second_timeout_has_already_elapsed() {
        // Timeout::Seconds(0) is a real, already-elapsed finite deadline,
        // distinct from the wire's "0 == None" sentinel handled elsewhere.
        let deadline = Deadline::starting_now(Timeout::Seconds(0));
        assert!(deadline.has_elapsed());
    }

    #[test]
    fn next_wait_is_capped_at_the_poll_interval() {
        let deadline = Deadline::starting_now(Timeout::Seconds(3600));
        assert!(deadline.next_wait() <= Duration::from_secs(crate::POLL_INTERVAL_SECS));
    }
}
