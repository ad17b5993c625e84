//! The result-status vocabulary (§6).

use core::fmt;
use core::str::FromStr;

/// Terminal status of a single command as reported by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Exit code was 0 and stderr was empty.
    Success,
    /// Non-zero exit code, or non-empty stderr.
    Error,
    /// The command's own timeout (or the SOS supervisor's) elapsed first.
    Timeout,
    /// The coordinator sent KILL before the command finished.
    Killed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Killed => "KILLED",
        };
        f.write_str(s)
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "SUCCESS" => Ok(Self::Success),
            "ERROR" => Ok(Self::Error),
            "TIMEOUT" => Ok(Self::Timeout),
            "KILLED" => Ok(Self::Killed),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        for status in [Status::Success, Status::Error, Status::Timeout, Status::Killed] {
            let rendered = status.to_string();
            assert_eq!(Status::from_str(&rendered).unwrap(), status);
        }
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(Status::from_str("WAT").is_err());
    }
}
