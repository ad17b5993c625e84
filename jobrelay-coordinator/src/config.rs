//! Loads a sequence of [`TestPlan`]s from a TOML file (ambient: the textual
//! grammar in `original_source/NetJobs.py`'s `parse_config` is explicitly
//! out of scope per §1; this is the arm's-length replacement that produces
//! the same validated data model described in §3).

use std::collections::BTreeMap;
use std::path::Path;

use jobrelay_protocol::{Job, MinHosts, Target, TestPlan, Timeout};
use serde::Deserialize;

use crate::error::CoordinatorError;

/// One `[[tests]]` entry in the TOML config.
#[derive(Debug, Deserialize)]
struct RawTest {
    label: String,
    #[serde(default)]
    general_timeout: RawTimeout,
    #[serde(default)]
    min_hosts: RawMinHosts,
    targets: BTreeMap<String, Vec<RawJob>>,
}

#[derive(Debug, Deserialize)]
struct RawJob {
    command: String,
    #[serde(default)]
    timeout: Option<RawTimeout>,
}

/// A timeout in the config file: an integer number of seconds, or the
/// string `"none"` (§6's NONE sentinel).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum RawTimeout {
    Seconds(u64),
    Sentinel(NoneSentinel),
}

impl Default for RawTimeout {
    fn default() -> Self {
        Self::Sentinel(NoneSentinel::None)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum NoneSentinel {
    None,
}

impl From<RawTimeout> for Timeout {
    fn from(value: RawTimeout) -> Self {
        match value {
            RawTimeout::Seconds(seconds) => Self::from_wire_seconds(seconds),
            RawTimeout::Sentinel(NoneSentinel::None) => Self::None,
        }
    }
}

/// `minhosts` in the config file: a positive integer, or the string `"all"`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum RawMinHosts {
    Count(usize),
    All(AllSentinel),
}

impl Default for RawMinHosts {
    fn default() -> Self {
        Self::All(AllSentinel::All)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum AllSentinel {
    All,
}

impl From<RawMinHosts> for MinHosts {
    fn from(value: RawMinHosts) -> Self {
        match value {
            RawMinHosts::Count(n) => Self::Count(n),
            RawMinHosts::All(AllSentinel::All) => Self::All,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "tests")]
    tests: Vec<RawTest>,
}

/// Reads and parses `path`, producing one validated [`TestPlan`] per
/// `[[tests]]` entry, in file order (§6's "ordered sequence of `TestPlan`
/// values").
///
/// # Errors
/// Returns [`CoordinatorError::ReadConfig`] if the file can't be read,
/// [`CoordinatorError::ParseConfig`] if it isn't valid TOML matching this
/// shape, or [`CoordinatorError::InvalidPlan`] if a test violates §3's
/// invariants (empty targets, empty jobs, `minHosts` above target count).
pub async fn load(path: impl AsRef<Path>) -> Result<Vec<TestPlan>, CoordinatorError> {
    let path = path.as_ref();
    let content =
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CoordinatorError::ReadConfig {
                path: path.display().to_string(),
                source,
            })?;
    parse(&content, path)
}

fn parse(content: &str, path: &Path) -> Result<Vec<TestPlan>, CoordinatorError> {
    let raw: RawConfig = toml::from_str(content).map_err(|source| CoordinatorError::ParseConfig {
        path: path.display().to_string(),
        source: Box::new(source),
    })?;

    raw.tests
        .into_iter()
        .map(|test| {
            let general_timeout: Timeout = test.general_timeout.into();
            let targets = test
                .targets
                .into_iter()
                .map(|(address, raw_jobs)| {
                    let jobs = raw_jobs
                        .into_iter()
                        .map(|raw_job| {
                            let timeout = raw_job
                                .timeout
                                .map_or(general_timeout, std::convert::Into::into);
                            Job::new(raw_job.command, timeout)
                        })
                        .collect();
                    (address.clone(), Target { address, jobs })
                })
                .collect();

            let plan = TestPlan {
                label: test.label.clone(),
                general_timeout,
                min_hosts: test.min_hosts.into(),
                targets,
            };
            plan.validate()
                .map_err(|source| CoordinatorError::InvalidPlan {
                    label: test.label,
                    source,
                })?;
            Ok(plan)
        })
        .collect()
}
