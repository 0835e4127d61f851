//! Application service: poll a resolved run until it reaches a terminal state.
//!
//! Imports only from `crate::domain` and `crate::application`.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::interrupt::Interrupt;
use crate::application::ports::{ProgressReporter, WorkflowApi};
use crate::domain::{RunHandle, RunId, RunSnapshot, RunStatus, WorkflowError};

/// Poll budget for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub timeout: Duration,
    pub interval: Duration,
    /// Cancel the remote run on timeout or interrupt. Set for operations
    /// that leave billable resources behind when abandoned.
    pub cancel_on_timeout: bool,
}

/// Poll `handle`'s run until it is terminal.
///
/// The first status call is issued immediately. Time is checked once per
/// iteration, after each non-terminal snapshot, so `timeout = 0` makes
/// exactly one call. Nothing is fetched after a terminal snapshot.
///
/// # Errors
///
/// - `InvalidRequest` if the handle is not resolved.
/// - `PollFailed` / `Auth` if a status call fails after client retries.
/// - `PollTimeout` if the budget runs out first.
/// - `Interrupted` if the caller cancels.
pub async fn poll_until_terminal(
    api: &impl WorkflowApi,
    handle: &RunHandle,
    opts: &PollOptions,
    interrupt: &Interrupt,
    reporter: &impl ProgressReporter,
) -> Result<RunSnapshot, WorkflowError> {
    let Some(run_id) = handle.run_id() else {
        return Err(WorkflowError::InvalidRequest(format!(
            "dispatch of {} has no resolved run to poll",
            handle.workflow
        )));
    };

    let started = Instant::now();
    let mut last: Option<RunStatus> = None;
    loop {
        let snapshot = api
            .fetch_run_status(run_id)
            .await
            .map_err(|e| WorkflowError::poll(&handle.workflow, run_id, e))?;

        if last != Some(snapshot.status) {
            info!(
                run_id = %run_id,
                from = last.map_or("-", RunStatus::as_str),
                to = %snapshot.status,
                "run status changed"
            );
            reporter.step(&format!("Run {run_id}: {}", snapshot.status));
        } else {
            debug!(run_id = %run_id, status = %snapshot.status, "run status unchanged");
        }
        last = Some(snapshot.status);

        if snapshot.status.is_terminal() {
            return Ok(snapshot);
        }

        let elapsed = started.elapsed();
        if elapsed >= opts.timeout {
            warn!(run_id = %run_id, timeout_secs = opts.timeout.as_secs(), "run did not finish in time");
            let cancel_attempted = opts.cancel_on_timeout && cancel_best_effort(api, run_id).await;
            return Err(WorkflowError::PollTimeout {
                workflow: handle.workflow.clone(),
                run_id,
                timeout: opts.timeout,
                last_status: snapshot.status,
                cancel_attempted,
            });
        }

        if !interrupt.sleep(opts.interval.min(opts.timeout - elapsed)).await {
            warn!(run_id = %run_id, "interrupted while polling");
            let cancel_attempted = opts.cancel_on_timeout && cancel_best_effort(api, run_id).await;
            return Err(WorkflowError::Interrupted {
                workflow: handle.workflow.clone(),
                run_id: Some(run_id),
                cancel_attempted,
            });
        }
    }
}

/// Ask the remote to cancel a run. Failure is logged, never escalated.
///
/// Returns `true` once the attempt has been made.
pub async fn cancel_best_effort(api: &impl WorkflowApi, run_id: RunId) -> bool {
    match api.cancel_run(run_id).await {
        Ok(()) => info!(run_id = %run_id, "cancellation requested"),
        Err(e) => warn!(run_id = %run_id, error = %e, "cancellation failed"),
    }
    true
}
