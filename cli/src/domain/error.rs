//! Typed domain error enums.
//!
//! `ApiError` is what a single remote call can fail with. `WorkflowError` is
//! what an operation surfaces to its caller, always with enough context
//! (workflow, dispatch time, run id when known) to inspect the run by hand.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::run::{RunId, RunStatus, RunSummary};

// ── Remote API errors ─────────────────────────────────────────────────────────

/// Failure of one remote call, after the client's own retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("authentication failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("rate limit exceeded{}", retry_hint(*.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("network error: {0}")]
    Transient(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ApiError {
    /// Rate limits and transient failures are worth another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. } | ApiError::Transient(_))
    }

    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth { .. })
    }
}

fn retry_hint(retry_after: Option<Duration>) -> String {
    retry_after.map_or_else(String::new, |d| {
        format!(" (retry after {}s)", d.as_secs())
    })
}

// ── Workflow errors ───────────────────────────────────────────────────────────

/// Errors surfaced by orchestration operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}\n\nCheck that GITHUB_TOKEN is valid and can run workflows in the repository.")]
    Auth(ApiError),

    #[error("Failed to dispatch workflow {workflow}: {cause}")]
    DispatchFailed { workflow: String, cause: ApiError },

    #[error(
        "No run of workflow {workflow} appeared for the dispatch at {dispatched_at} \
         after {attempts} attempts.\n  inputs: {inputs}{}",
        describe_recent(.recent)
    )]
    RunNotFound {
        workflow: String,
        dispatched_at: DateTime<Utc>,
        inputs: String,
        attempts: u32,
        recent: Vec<RunSummary>,
    },

    #[error(
        "Run {run_id} of {workflow} did not finish within {}s (last status: {last_status}).{}",
        .timeout.as_secs(),
        cancel_note(*.cancel_attempted)
    )]
    PollTimeout {
        workflow: String,
        run_id: RunId,
        timeout: Duration,
        last_status: RunStatus,
        cancel_attempted: bool,
    },

    #[error("Lost track of run {run_id} of {workflow}: {cause}")]
    PollFailed {
        workflow: String,
        run_id: RunId,
        cause: ApiError,
    },

    #[error(
        "Run {run_id} of {workflow} finished with conclusion '{conclusion}'.{}{}",
        describe_url(.html_url.as_deref()),
        describe_excerpt(.log_excerpt)
    )]
    RemoteRunFailed {
        workflow: String,
        run_id: RunId,
        conclusion: String,
        html_url: Option<String>,
        log_excerpt: Vec<String>,
    },

    #[error("Interrupted while waiting for {workflow}{}.{}", describe_run(*.run_id), cancel_note(*.cancel_attempted))]
    Interrupted {
        workflow: String,
        run_id: Option<RunId>,
        cancel_attempted: bool,
    },

    #[error("Failed to fetch results of run {run_id}: {cause}")]
    ArtifactsFailed { run_id: RunId, cause: ApiError },

    #[error("Failed to {action}: {cause}")]
    RequestFailed { action: String, cause: ApiError },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl WorkflowError {
    /// Classify a dispatch failure. Credential problems stay distinct.
    #[must_use]
    pub fn dispatch(workflow: impl Into<String>, cause: ApiError) -> Self {
        if cause.is_auth() {
            return WorkflowError::Auth(cause);
        }
        WorkflowError::DispatchFailed {
            workflow: workflow.into(),
            cause,
        }
    }

    /// Classify a failure while watching a known run.
    #[must_use]
    pub fn poll(workflow: impl Into<String>, run_id: RunId, cause: ApiError) -> Self {
        if cause.is_auth() {
            return WorkflowError::Auth(cause);
        }
        WorkflowError::PollFailed {
            workflow: workflow.into(),
            run_id,
            cause,
        }
    }

    /// Classify a failure fetching a finished run's logs or artifacts.
    #[must_use]
    pub fn results(run_id: RunId, cause: ApiError) -> Self {
        if cause.is_auth() {
            return WorkflowError::Auth(cause);
        }
        WorkflowError::ArtifactsFailed { run_id, cause }
    }

    /// Classify a failure of a standalone query.
    #[must_use]
    pub fn request(action: impl Into<String>, cause: ApiError) -> Self {
        if cause.is_auth() {
            return WorkflowError::Auth(cause);
        }
        WorkflowError::RequestFailed {
            action: action.into(),
            cause,
        }
    }

    /// Stable snake_case identifier, used in JSON output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::Auth(_) => "auth",
            WorkflowError::DispatchFailed { .. } => "dispatch_failed",
            WorkflowError::RunNotFound { .. } => "run_not_found",
            WorkflowError::PollTimeout { .. } => "poll_timeout",
            WorkflowError::PollFailed { .. } => "poll_failed",
            WorkflowError::RemoteRunFailed { .. } => "remote_run_failed",
            WorkflowError::Interrupted { .. } => "interrupted",
            WorkflowError::ArtifactsFailed { .. } => "artifacts_failed",
            WorkflowError::RequestFailed { .. } => "request_failed",
            WorkflowError::InvalidRequest(_) => "invalid_request",
        }
    }

    /// The run involved, when one had been identified.
    #[must_use]
    pub fn run_id(&self) -> Option<RunId> {
        match self {
            WorkflowError::PollTimeout { run_id, .. }
            | WorkflowError::PollFailed { run_id, .. }
            | WorkflowError::RemoteRunFailed { run_id, .. }
            | WorkflowError::ArtifactsFailed { run_id, .. } => Some(*run_id),
            WorkflowError::Interrupted { run_id, .. } => *run_id,
            _ => None,
        }
    }
}

fn describe_recent(recent: &[RunSummary]) -> String {
    if recent.is_empty() {
        return "\n  no recent dispatch runs were listed".to_string();
    }
    let mut out = String::from("\n  most recent runs:");
    for run in recent {
        out.push_str(&format!(
            "\n    {} created {} status {} by {}",
            run.id,
            run.created_at.to_rfc3339(),
            run.status,
            run.actor.as_deref().unwrap_or("?"),
        ));
    }
    out
}

fn cancel_note(attempted: bool) -> &'static str {
    if attempted {
        " Cancellation of the remote run was requested."
    } else {
        ""
    }
}

fn describe_run(run_id: Option<RunId>) -> String {
    run_id.map_or_else(String::new, |id| format!(" (run {id})"))
}

fn describe_url(url: Option<&str>) -> String {
    url.map_or_else(String::new, |u| format!("\n  {u}"))
}

fn describe_excerpt(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\nLast log lines:");
    for line in lines {
        out.push_str("\n  ");
        out.push_str(line);
    }
    out
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Startup-time configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set. Export a GitHub token that can dispatch workflows.")]
    MissingCredential(&'static str),

    #[error("Invalid value for {key}: {value}\n\nExpected: {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },
}
