//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::domain::{
    ApiError, ArtifactSummary, DispatchAck, DispatchRequest, PushbutanConfig, RunId, RunLog,
    RunSnapshot, RunSummary, WorkflowRef, WorkflowSummary,
};

// ── Remote Workflow Port ──────────────────────────────────────────────────────

/// Typed access to a CI provider's workflow API for one repository.
///
/// Implementations retry rate-limited and transient failures internally;
/// an `Err` here means retries are exhausted or the failure is terminal.
#[allow(async_fn_in_trait)]
pub trait WorkflowApi {
    /// Login of the user the credential belongs to.
    async fn authenticated_user(&self) -> Result<String, ApiError>;

    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, ApiError>;

    /// Trigger a run. The acknowledgement never carries a run id.
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchAck, ApiError>;

    /// Dispatch-triggered runs of `workflow` created at or after `since`.
    async fn fetch_recent_runs(
        &self,
        workflow: &WorkflowRef,
        since: DateTime<Utc>,
    ) -> Result<Vec<RunSummary>, ApiError>;

    async fn fetch_run_status(&self, run_id: RunId) -> Result<RunSnapshot, ApiError>;

    async fn fetch_run_log(&self, run_id: RunId) -> Result<RunLog, ApiError>;

    async fn list_artifacts(&self, run_id: RunId) -> Result<Vec<ArtifactSummary>, ApiError>;

    /// Download and unpack one artifact under `dest`, returning the files written.
    async fn download_artifact(
        &self,
        artifact: &ArtifactSummary,
        dest: &Path,
    ) -> Result<Vec<PathBuf>, ApiError>;

    async fn cancel_run(&self, run_id: RunId) -> Result<(), ApiError>;
}

// ── Rate Limit Port ───────────────────────────────────────────────────────────

/// Request budget shared by every client in the process.
///
/// Passed in explicitly so tests can inject a limiter that never waits.
pub trait RequestLimiter: Send + Sync {
    /// Take one slot, returning how long the caller must wait before sending.
    fn reserve(&self) -> Duration;

    /// The remote signalled a rate limit: stop handing out slots for `pause`
    /// (or a limiter-chosen default when `None`).
    fn penalize(&self, pause: Option<Duration>);
}

// ── Log Archive Port ──────────────────────────────────────────────────────────

/// Local persistence of run logs for later inspection.
pub trait LogArchive: Send + Sync {
    /// Write the archive and its members, returning the combined-log path.
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be written.
    fn save(&self, run_id: RunId, log: &RunLog) -> Result<PathBuf>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts configuration loading so commands can be tested without a
/// home directory.
pub trait ConfigStore {
    /// Load the configuration, falling back to defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<PushbutanConfig>;
    /// Location of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    fn path(&self) -> Result<PathBuf>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait, no async needed.
pub trait ProgressReporter: Send + Sync {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
