//! The orchestrator (§4.2): runs a sequence of tests, sequentially, each
//! through prepare → start → collection → cleanup.

use std::sync::Arc;

use futures::future::join_all;
use jobrelay_protocol::{ControlToken, TestPlan};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::abort::AbortPolicy;
use crate::listener::{self, ListenerOutcome};
use crate::prepare;
use crate::session::{TargetResults, TestResults};
use crate::transport::Transport;

/// Whether a test ran to completion or was aborted by the minhosts policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Completed,
    Aborted,
}

/// Runs every test in `plans`, sequentially, printing a results summary for
/// each (§4.2, and the per-test console output carried over from the
/// original tool).
pub async fn run_all(plans: &[TestPlan], transport: Transport) {
    for plan in plans {
        let outcome = run_test(plan, transport).await;
        info!(test = %plan.label, ?outcome, "test finished");
    }
}

/// Runs a single test through all four phases and returns whether it
/// completed or was aborted.
pub async fn run_test(plan: &TestPlan, transport: Transport) -> TestOutcome {
    run_test_with_results(plan, transport).await.0
}

/// Like [`run_test`], but also returns the final result snapshot (§8's
/// totality guarantee), for callers — notably tests — that need to inspect
/// individual slots rather than just the overall outcome.
pub async fn run_test_with_results(
    plan: &TestPlan,
    transport: Transport,
) -> (TestOutcome, std::collections::BTreeMap<String, TargetResults>) {
    let results = Arc::new(TestResults::new());
    let abort = Arc::new(AbortPolicy::new(plan.label.clone(), plan.min_hosts, plan.targets.len()));

    for (address, target) in &plan.targets {
        results.register_target(address, target.jobs.len());
    }

    // Prepare phase: connect and configure every target concurrently. A
    // target that fails here is handled by the abort policy exactly like a
    // listener timeout (§4.2), and contributes no listener.
    let prepare_futures = plan.targets.values().map(|target| {
        let abort = abort.clone();
        async move {
            match prepare::prepare(transport, target).await {
                Ok(stream) => Some((target, stream)),
                Err(error) => {
                    warn!(target = %target.address, %error, "prepare failed");
                    abort.fail(&target.address);
                    None
                }
            }
        }
    });
    let prepared: Vec<_> = join_all(prepare_futures).await.into_iter().flatten().collect();

    if abort.is_aborted() {
        // minHosts was already unreachable before a single listener ran.
        for (target, mut stream) in prepared {
            let _ = stream.shutdown().await;
            results.signoff(&target.address);
        }
        // Targets absorbed by the minhosts budget (never prepared at all)
        // still need a total result row (§8).
        for address in plan.targets.keys() {
            results.signoff(address);
        }
        print_summary(plan, &results);
        return (TestOutcome::Aborted, results.snapshot());
    }

    // Start phase: every listener is spawned (registered) before START is
    // sent on any connection, so no result can race a listener's startup
    // (§4.2). Each connection's write half is shared with its listener,
    // which only ever uses it for a best-effort KILL.
    let mut listener_handles = Vec::with_capacity(prepared.len());
    let mut start_writers = Vec::with_capacity(prepared.len());
    for (target, stream) in prepared {
        let (read_half, write_half) = stream.into_split();
        let write_half = Arc::new(Mutex::new(write_half));
        start_writers.push((target.address.clone(), write_half.clone()));

        let results = results.clone();
        let abort = abort.clone();
        let target = target.clone();
        let test_label = plan.label.clone();
        listener_handles.push((
            target.address.clone(),
            tokio::spawn(async move {
                listener::run(read_half, write_half, &target, &test_label, results, abort).await
            }),
        ));
    }

    for (address, write_half) in start_writers {
        let mut guard = write_half.lock().await;
        if let Err(error) = ControlToken::Start.send(&mut *guard).await {
            warn!(target = %address, %error, "failed to send START");
        }
    }

    print_summary_header(plan);

    // Collection phase: block until every listener terminates.
    let outcomes = join_all(listener_handles.into_iter().map(|(address, handle)| async move {
        let outcome = handle.await.unwrap_or(ListenerOutcome::Failed);
        (address, outcome)
    }))
    .await;

    for (address, outcome) in &outcomes {
        info!(test = %plan.label, target = %address, ?outcome, "listener finished");
    }

    // Targets that never got a listener (absorbed by the minhosts budget
    // during prepare) still need a total result row (§8); each listener
    // above has already signed off its own target.
    for address in plan.targets.keys() {
        results.signoff(address);
    }

    print_summary(plan, &results);

    let outcome = if abort.is_aborted() {
        TestOutcome::Aborted
    } else {
        TestOutcome::Completed
    };
    (outcome, results.snapshot())
}

fn print_summary_header(plan: &TestPlan) {
    println!();
    println!("-- {} // RESULTS:", plan.label);
}

fn print_summary(plan: &TestPlan, results: &TestResults) {
    let snapshot = results.snapshot();
    for (address, target) in &plan.targets {
        let Some(slots) = snapshot.get(address) else {
            continue;
        };
        for (job, slot) in target.jobs.iter().zip(slots) {
            match slot {
                Some((status, output)) => {
                    println!("\t\t\t{address}\t{}\t{status}\t{output}", job.command);
                }
                None => {
                    println!("\t\t\t{address}\t{}\tKILLED\t", job.command);
                }
            }
        }
    }
}
