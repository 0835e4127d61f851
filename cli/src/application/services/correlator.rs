//! Application service: dispatch a workflow and find the run it created.
//!
//! Imports only from `crate::domain` and `crate::application`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::interrupt::Interrupt;
use crate::application::ports::{ProgressReporter, WorkflowApi};
use crate::application::services::poller::cancel_best_effort;
use crate::domain::correlation::{MatchCriteria, select_earliest};
use crate::domain::{ApiError, DispatchRequest, RunHandle, RunId, RunSummary, WorkflowError};

/// How many of the latest listed runs a `RunNotFound` error reports.
const RECENT_RUNS_REPORTED: usize = 5;

/// Retention used by [`ClaimRegistry::new`].
const DEFAULT_CLAIM_RETENTION: Duration = Duration::from_secs(600);

/// Run ids already bound to a dispatch in this process.
///
/// Cloning shares the registry. Every concurrent operation in one process
/// must claim through the same registry so no two handles bind the same run.
///
/// A claim only matters while some correlation window could still list the
/// run, so claims older than the retention are forgotten.
#[derive(Debug, Clone)]
pub struct ClaimRegistry {
    retention: Duration,
    claimed: Arc<Mutex<HashMap<RunId, Instant>>>,
}

impl ClaimRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_CLAIM_RETENTION)
    }

    #[must_use]
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            retention,
            claimed: Arc::default(),
        }
    }

    /// Select and claim the earliest unclaimed run matching `criteria`.
    ///
    /// Selection and insertion happen under one lock.
    pub fn claim_earliest(
        &self,
        runs: &[RunSummary],
        criteria: &MatchCriteria<'_>,
    ) -> Option<RunId> {
        let now = Instant::now();
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        claimed.retain(|_, at| now.saturating_duration_since(*at) < self.retention);
        let live: HashSet<RunId> = claimed.keys().copied().collect();
        let id = select_earliest(runs, criteria, &live)?.id;
        claimed.insert(id, now);
        Some(id)
    }

    #[must_use]
    pub fn is_claimed(&self, run_id: RunId) -> bool {
        let now = Instant::now();
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&run_id)
            .is_some_and(|at| now.saturating_duration_since(*at) < self.retention)
    }

    /// Number of claims still held.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        claimed.retain(|_, at| now.saturating_duration_since(*at) < self.retention);
        claimed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClaimRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing of the correlation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationOptions {
    /// Wait before the first listing; new runs take a few seconds to appear.
    pub initial_delay: Duration,
    pub interval: Duration,
    /// Window measured from the end of the initial delay.
    pub timeout: Duration,
    pub clock_skew: Duration,
    /// Keep looking for the run after an interrupt so it can be cancelled.
    /// Set for launches, whose runs leave billable resources behind.
    pub cancel_on_interrupt: bool,
}

impl CorrelationOptions {
    /// How long a claim must be remembered: any window still open when the
    /// claim was made closes within this time.
    #[must_use]
    pub fn claim_retention(&self) -> Duration {
        self.initial_delay + self.timeout + self.clock_skew * 2
    }
}

/// Dispatch `request` and resolve the run it produced.
///
/// `actor` is the login the credential belongs to, when known.
///
/// # Errors
///
/// - `Auth` / `DispatchFailed` if the dispatch call fails.
/// - `RunNotFound` if no matching run appears within the window.
/// - `Interrupted` if the caller cancels. Nothing is dispatched when the
///   interrupt is already raised. With `cancel_on_interrupt`, an interrupt
///   after the dispatch still resolves the run and cancels it.
pub async fn dispatch_and_correlate(
    api: &impl WorkflowApi,
    claims: &ClaimRegistry,
    request: &DispatchRequest,
    actor: Option<&str>,
    opts: &CorrelationOptions,
    interrupt: &Interrupt,
    reporter: &impl ProgressReporter,
) -> Result<RunHandle, WorkflowError> {
    let workflow = request.workflow.workflow.to_string();
    let dispatched_at = Utc::now();
    let token = request.fingerprint(dispatched_at);
    let sent = request.tagged(&token);

    info!(
        workflow = %workflow,
        git_ref = %request.workflow.git_ref,
        inputs = %sent.describe_inputs(),
        token = %token,
        "dispatching workflow"
    );
    if interrupt.is_raised() {
        return Err(interrupted(&workflow, None, false));
    }
    reporter.step(&format!("Dispatching workflow {workflow}..."));
    let ack = api
        .dispatch(&sent)
        .await
        .map_err(|e| WorkflowError::dispatch(&workflow, e))?;
    debug!(status = ack.status, "dispatch acknowledged");

    let handle = RunHandle::pending(workflow, dispatched_at);
    let token = request.workflow.correlation_input.as_ref().map(|_| token.as_str());
    reporter.step("Waiting for the run to appear...");
    correlate(api, claims, handle, &sent, actor, token, opts, interrupt).await
}

#[allow(clippy::too_many_arguments)]
async fn correlate(
    api: &impl WorkflowApi,
    claims: &ClaimRegistry,
    handle: RunHandle,
    request: &DispatchRequest,
    actor: Option<&str>,
    token: Option<&str>,
    opts: &CorrelationOptions,
    interrupt: &Interrupt,
) -> Result<RunHandle, WorkflowError> {
    let not_before = earliest_acceptable(handle.dispatched_at, opts.clock_skew);
    let criteria = MatchCriteria {
        workflow: &request.workflow.workflow,
        git_ref: &request.workflow.git_ref,
        not_before,
        actor,
        token,
    };

    let mut pause = Pause {
        interrupt,
        keep_going: opts.cancel_on_interrupt,
        interrupted: false,
    };
    if !pause.wait(opts.initial_delay).await {
        return Err(interrupted(&handle.workflow, None, false));
    }

    let started = Instant::now();
    let mut attempts = 0u32;
    let mut recent: Vec<RunSummary> = Vec::new();
    loop {
        attempts += 1;
        match api.fetch_recent_runs(&request.workflow.workflow, not_before).await {
            Ok(runs) => {
                debug!(attempt = attempts, listed = runs.len(), "listed recent runs");
                if let Some(run_id) = claims.claim_earliest(&runs, &criteria) {
                    info!(workflow = %handle.workflow, run_id = %run_id, attempts, "run correlated");
                    if pause.interrupted {
                        let cancel_attempted = cancel_best_effort(api, run_id).await;
                        return Err(interrupted(&handle.workflow, Some(run_id), cancel_attempted));
                    }
                    return Ok(handle.resolve(run_id));
                }
                recent = latest(runs);
            }
            Err(ApiError::NotFound(what)) => {
                debug!(attempt = attempts, %what, "runs not visible yet");
            }
            Err(e) if e.is_retryable() => {
                warn!(attempt = attempts, error = %e, "listing runs failed, will retry");
            }
            Err(e) => return Err(WorkflowError::dispatch(&handle.workflow, e)),
        }

        let elapsed = started.elapsed();
        if elapsed >= opts.timeout {
            break;
        }
        if !pause.wait(opts.interval.min(opts.timeout - elapsed)).await {
            return Err(interrupted(&handle.workflow, None, false));
        }
    }

    if pause.interrupted {
        warn!(
            workflow = %handle.workflow,
            attempts,
            "interrupted; the dispatched run never appeared, nothing to cancel"
        );
        return Err(interrupted(&handle.workflow, None, false));
    }
    let handle = handle.unresolved();
    warn!(workflow = %handle.workflow, attempts, "no run matched the dispatch");
    Err(WorkflowError::RunNotFound {
        workflow: handle.workflow,
        dispatched_at: handle.dispatched_at,
        inputs: request.describe_inputs(),
        attempts,
        recent,
    })
}

fn earliest_acceptable(dispatched_at: DateTime<Utc>, skew: Duration) -> DateTime<Utc> {
    let skew = chrono::Duration::from_std(skew).unwrap_or_else(|_| chrono::Duration::zero());
    dispatched_at - skew
}

fn latest(mut runs: Vec<RunSummary>) -> Vec<RunSummary> {
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    runs.truncate(RECENT_RUNS_REPORTED);
    runs
}

fn interrupted(workflow: &str, run_id: Option<RunId>, cancel_attempted: bool) -> WorkflowError {
    WorkflowError::Interrupted {
        workflow: workflow.to_string(),
        run_id,
        cancel_attempted,
    }
}

/// Sleeps between listings, tracking whether the caller has interrupted.
struct Pause<'a> {
    interrupt: &'a Interrupt,
    /// Ride out interrupts so the run can still be found.
    keep_going: bool,
    interrupted: bool,
}

impl Pause<'_> {
    /// Returns `false` when the caller should give up now.
    async fn wait(&mut self, duration: Duration) -> bool {
        if self.interrupted {
            tokio::time::sleep(duration).await;
            return true;
        }
        let until = Instant::now() + duration;
        if self.interrupt.sleep(duration).await {
            return true;
        }
        self.interrupted = true;
        if !self.keep_going {
            return false;
        }
        warn!("interrupted after dispatch; still looking for the run to cancel it");
        tokio::time::sleep_until(until).await;
        true
    }
}
