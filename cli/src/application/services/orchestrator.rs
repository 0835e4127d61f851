//! Application service: the `Pushbutan` facade.
//!
//! Each operation composes dispatch, correlation, polling and extraction
//! into one logical transaction. The CLI and the tool server are both plain
//! callers of this type.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pushbutan_common::{
    InstanceResult, InstanceType, JobStatusReport, Os, SignResult, StopResult,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::application::interrupt::Interrupt;
use crate::application::ports::{LogArchive, ProgressReporter, WorkflowApi};
use crate::application::services::correlator::{
    ClaimRegistry, CorrelationOptions, dispatch_and_correlate,
};
use crate::application::services::poller::{PollOptions, poll_until_terminal};
use crate::domain::config::PollingConfig;
use crate::domain::{
    DispatchRequest, PushbutanConfig, RunHandle, RunId, RunLog, RunSnapshot, RunStatus,
    SignMarkers, WorkflowError, WorkflowSpec, WorkflowSummary, extract,
};

/// Lines of log attached to a `RemoteRunFailed` error.
pub const LOG_EXCERPT_LINES: usize = 20;

const IMAGE_ID: &str = "latest";

// ── Requests ──────────────────────────────────────────────────────────────────

/// Parameters of a dev-instance launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub os: Os,
    pub instance_type: InstanceType,
    /// Hours before the instance terminates itself.
    pub lifetime_hours: u32,
    /// Branch of the provisioning scripts to use.
    pub branch: String,
}

impl Default for StartRequest {
    fn default() -> Self {
        Self {
            os: Os::Linux,
            instance_type: InstanceType::G4dn4xlarge,
            lifetime_hours: 24,
            branch: "main".to_string(),
        }
    }
}

/// Parameters of a package-signing run. The values are passed through to
/// the workflow unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    pub channel: String,
    pub package_filter: String,
    pub cert: String,
    pub generate_repodata: bool,
    /// Download the run's artifacts here when set.
    pub download_dir: Option<PathBuf>,
}

/// Per-call options shared by the blocking operations.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Persist the run's logs under the configured logs dir.
    pub save_logs: bool,
    /// Overrides the configured poll timeout for this call.
    pub timeout: Option<Duration>,
    pub interrupt: Interrupt,
}

// ── Facade ────────────────────────────────────────────────────────────────────

/// Orchestration facade over one repository's workflows.
pub struct Pushbutan<A> {
    api: A,
    config: PushbutanConfig,
    claims: ClaimRegistry,
    archive: Arc<dyn LogArchive>,
    actor: OnceCell<Option<String>>,
}

impl<A: WorkflowApi> Pushbutan<A> {
    #[must_use]
    pub fn new(api: A, config: PushbutanConfig, archive: Arc<dyn LogArchive>) -> Self {
        let retention = correlation_options(&config.polling, false).claim_retention();
        Self {
            api,
            config,
            claims: ClaimRegistry::with_retention(retention),
            archive,
            actor: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Workflow definitions of the configured repository.
    ///
    /// # Errors
    ///
    /// Returns `Auth` or `RequestFailed` if the listing fails.
    pub async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, WorkflowError> {
        self.api
            .list_workflows()
            .await
            .map_err(|e| WorkflowError::request("list workflows", e))
    }

    // ── Start ─────────────────────────────────────────────────────────────────

    /// Dispatch a dev-instance launch and resolve its run, without waiting
    /// for the instance.
    ///
    /// # Errors
    ///
    /// Returns the dispatch or correlation error.
    pub async fn trigger_instance(
        &self,
        req: &StartRequest,
        reporter: &impl ProgressReporter,
    ) -> Result<RunHandle, WorkflowError> {
        let request = self.start_request(req)?;
        let handle = self
            .trigger(&request, &Interrupt::never(), true, reporter)
            .await?;
        reporter.success(&run_found(&handle));
        Ok(handle)
    }

    /// Launch a dev instance and wait until it is up.
    ///
    /// Timeout and interrupt both cancel the remote run, since an abandoned
    /// launch leaves a billable instance behind. An interrupt that lands
    /// before the run is correlated still cancels it once it appears.
    ///
    /// # Errors
    ///
    /// Any `WorkflowError`; incomplete extraction is not an error.
    pub async fn start_instance(
        &self,
        req: &StartRequest,
        opts: &RunOptions,
        reporter: &impl ProgressReporter,
    ) -> Result<InstanceResult, WorkflowError> {
        let request = self.start_request(req)?;
        let handle = self.trigger(&request, &opts.interrupt, true, reporter).await?;
        reporter.success(&run_found(&handle));

        let poll = PollOptions {
            timeout: opts.timeout.unwrap_or(self.config.polling.start_timeout()),
            interval: self.config.polling.interval(),
            cancel_on_timeout: true,
        };
        let snapshot =
            poll_until_terminal(&self.api, &handle, &poll, &opts.interrupt, reporter).await?;
        self.ensure_success(&handle, &snapshot).await?;

        let log = self.fetch_log(snapshot.run_id).await?;
        self.keep_logs(snapshot.run_id, &log, opts.save_logs, reporter);
        let result: InstanceResult = extract(&log.combined());
        warn_incomplete(snapshot.run_id, &result.missing_fields(), reporter);
        info!(run_id = %snapshot.run_id, instance_id = %result.instance_id, "instance ready");
        Ok(result)
    }

    // ── Stop ──────────────────────────────────────────────────────────────────

    /// Dispatch the teardown of an instance without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an empty id, else the dispatch or
    /// correlation error.
    pub async fn trigger_stop(
        &self,
        instance_id: &str,
        reporter: &impl ProgressReporter,
    ) -> Result<RunHandle, WorkflowError> {
        let request = self.stop_request(instance_id)?;
        let handle = self
            .trigger(&request, &Interrupt::never(), false, reporter)
            .await?;
        reporter.success(&run_found(&handle));
        Ok(handle)
    }

    /// Tear down an instance and wait for the workflow to finish.
    ///
    /// # Errors
    ///
    /// Any `WorkflowError`.
    pub async fn stop_instance(
        &self,
        instance_id: &str,
        opts: &RunOptions,
        reporter: &impl ProgressReporter,
    ) -> Result<StopResult, WorkflowError> {
        let request = self.stop_request(instance_id)?;
        let handle = self.trigger(&request, &opts.interrupt, false, reporter).await?;
        reporter.success(&run_found(&handle));

        let poll = PollOptions {
            timeout: opts.timeout.unwrap_or(self.config.polling.stop_timeout()),
            interval: self.config.polling.interval(),
            cancel_on_timeout: false,
        };
        let snapshot =
            poll_until_terminal(&self.api, &handle, &poll, &opts.interrupt, reporter).await?;
        self.ensure_success(&handle, &snapshot).await?;

        if opts.save_logs {
            let log = self.fetch_log(snapshot.run_id).await?;
            self.keep_logs(snapshot.run_id, &log, true, reporter);
        }
        Ok(StopResult {
            run_id: snapshot.run_id.0,
            instance_id: instance_id.trim().to_string(),
        })
    }

    // ── Sign ──────────────────────────────────────────────────────────────────

    /// Sign packages through the code-signing workflow.
    ///
    /// # Errors
    ///
    /// Any `WorkflowError`. `ArtifactsFailed` if a requested download fails.
    pub async fn sign_package(
        &self,
        req: &SignRequest,
        opts: &RunOptions,
        reporter: &impl ProgressReporter,
    ) -> Result<SignResult, WorkflowError> {
        let request = self.sign_request(req)?;
        let handle = self.trigger(&request, &opts.interrupt, false, reporter).await?;
        reporter.success(&run_found(&handle));

        let poll = PollOptions {
            timeout: opts.timeout.unwrap_or(self.config.polling.sign_timeout()),
            interval: self.config.polling.interval(),
            cancel_on_timeout: false,
        };
        let snapshot =
            poll_until_terminal(&self.api, &handle, &poll, &opts.interrupt, reporter).await?;
        self.ensure_success(&handle, &snapshot).await?;
        let run_id = snapshot.run_id;

        let log = self.fetch_log(run_id).await?;
        self.keep_logs(run_id, &log, opts.save_logs, reporter);
        let markers: SignMarkers = extract(&log.combined());

        // Names are informational unless they are about to be downloaded.
        let artifacts = match self.api.list_artifacts(run_id).await {
            Ok(artifacts) => artifacts,
            Err(e) if req.download_dir.is_some() => return Err(WorkflowError::results(run_id, e)),
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "could not list artifacts");
                reporter.warn(&format!("Could not list artifacts of run {run_id}: {e}"));
                Vec::new()
            }
        };
        let mut files = Vec::new();
        if let Some(dir) = &req.download_dir {
            for artifact in artifacts.iter().filter(|a| !a.expired) {
                reporter.step(&format!("Downloading artifact {}...", artifact.name));
                let written = self
                    .api
                    .download_artifact(artifact, dir)
                    .await
                    .map_err(|e| WorkflowError::results(run_id, e))?;
                debug!(artifact = %artifact.name, files = written.len(), "artifact unpacked");
                files.extend(written);
            }
        }

        let result = SignResult {
            run_id: run_id.0,
            channel: req.channel.clone(),
            location: markers.location,
            signed_count: markers.signed_count,
            repodata_generated: req.generate_repodata,
            artifacts: artifacts.into_iter().map(|a| a.name).collect(),
            files,
        };
        warn_incomplete(run_id, &result.missing_fields(), reporter);
        Ok(result)
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Coarse state of any run.
    ///
    /// # Errors
    ///
    /// Returns `Auth` or `RequestFailed` if the status cannot be fetched.
    pub async fn run_status(&self, run_id: RunId) -> Result<JobStatusReport, WorkflowError> {
        let snapshot = self
            .api
            .fetch_run_status(run_id)
            .await
            .map_err(|e| WorkflowError::request(format!("fetch status of run {run_id}"), e))?;
        Ok(snapshot.to_report())
    }

    /// Instance details of a finished launch run.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` while the run is still going, `RemoteRunFailed` if it
    /// failed, else fetch errors.
    pub async fn instance_details(
        &self,
        run_id: RunId,
        save_logs: bool,
    ) -> Result<InstanceResult, WorkflowError> {
        let snapshot = self
            .api
            .fetch_run_status(run_id)
            .await
            .map_err(|e| WorkflowError::request(format!("fetch status of run {run_id}"), e))?;
        if !snapshot.status.is_terminal() {
            return Err(WorkflowError::InvalidRequest(format!(
                "run {run_id} is still {}; details are available once it completes",
                snapshot.status
            )));
        }
        let workflow = self.config.workflows.dev_instance.workflow.to_string();
        let handle = RunHandle::pending(workflow, chrono::Utc::now()).resolve(run_id);
        self.ensure_success(&handle, &snapshot).await?;

        let log = self.fetch_log(run_id).await?;
        self.keep_logs(run_id, &log, save_logs, &Silent);
        let result: InstanceResult = extract(&log.combined());
        if !result.missing_fields().is_empty() {
            warn!(run_id = %run_id, missing = ?result.missing_fields(), "instance details incomplete");
        }
        Ok(result)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    async fn trigger(
        &self,
        request: &DispatchRequest,
        interrupt: &Interrupt,
        cancel_on_interrupt: bool,
        reporter: &impl ProgressReporter,
    ) -> Result<RunHandle, WorkflowError> {
        let actor = self.actor().await?;
        let opts = correlation_options(&self.config.polling, cancel_on_interrupt);
        dispatch_and_correlate(
            &self.api,
            &self.claims,
            request,
            actor,
            &opts,
            interrupt,
            reporter,
        )
        .await
    }

    /// Login of the credential's owner, looked up once.
    ///
    /// A rejected credential fails fast here, before anything is dispatched.
    /// Other failures only disable actor filtering.
    async fn actor(&self) -> Result<Option<&str>, WorkflowError> {
        let actor = self
            .actor
            .get_or_try_init(|| async {
                match self.api.authenticated_user().await {
                    Ok(login) => Ok(Some(login)),
                    Err(e) if e.is_auth() => Err(WorkflowError::Auth(e)),
                    Err(e) => {
                        warn!(error = %e, "could not look up the token owner; runs will not be filtered by actor");
                        Ok(None)
                    }
                }
            })
            .await?;
        Ok(actor.as_deref())
    }

    fn start_request(&self, req: &StartRequest) -> Result<DispatchRequest, WorkflowError> {
        if req.lifetime_hours == 0 {
            return Err(WorkflowError::InvalidRequest(
                "lifetime must be at least one hour".into(),
            ));
        }
        non_empty("branch", &req.branch)?;
        Ok(self
            .dispatch_for(&self.config.workflows.dev_instance)
            .input("arch", req.os.arch().as_str())
            .input("instance_type", req.instance_type.as_str())
            .input("cuda_version", req.os.cuda_version())
            .input("image_id", IMAGE_ID)
            .input("branch", req.branch.as_str())
            .input("lifetime", req.lifetime_hours.to_string()))
    }

    fn stop_request(&self, instance_id: &str) -> Result<DispatchRequest, WorkflowError> {
        non_empty("instance id", instance_id)?;
        Ok(self
            .dispatch_for(&self.config.workflows.stop_instance)
            .input("instance_id", instance_id.trim()))
    }

    fn sign_request(&self, req: &SignRequest) -> Result<DispatchRequest, WorkflowError> {
        non_empty("channel", &req.channel)?;
        non_empty("package filter", &req.package_filter)?;
        non_empty("cert", &req.cert)?;
        Ok(self
            .dispatch_for(&self.config.workflows.codesign)
            .input("channel", req.channel.as_str())
            .input("package_filter", req.package_filter.as_str())
            .input("cert", req.cert.as_str())
            .input("generate_repodata", req.generate_repodata.to_string()))
    }

    fn dispatch_for(&self, spec: &WorkflowSpec) -> DispatchRequest {
        DispatchRequest::new(spec.clone())
    }

    /// Turn a non-success terminal snapshot into `RemoteRunFailed`, with the
    /// tail of the log when it can be fetched.
    async fn ensure_success(
        &self,
        handle: &RunHandle,
        snapshot: &RunSnapshot,
    ) -> Result<(), WorkflowError> {
        if snapshot.status == RunStatus::Success {
            return Ok(());
        }
        let log_excerpt = match self.api.fetch_run_log(snapshot.run_id).await {
            Ok(log) => log.tail(LOG_EXCERPT_LINES),
            Err(e) => {
                debug!(run_id = %snapshot.run_id, error = %e, "no log excerpt for failed run");
                Vec::new()
            }
        };
        warn!(
            run_id = %snapshot.run_id,
            conclusion = snapshot.conclusion_label(),
            "remote run failed"
        );
        Err(WorkflowError::RemoteRunFailed {
            workflow: handle.workflow.clone(),
            run_id: snapshot.run_id,
            conclusion: snapshot.conclusion_label().to_string(),
            html_url: snapshot.html_url.clone(),
            log_excerpt,
        })
    }

    async fn fetch_log(&self, run_id: RunId) -> Result<RunLog, WorkflowError> {
        self.api
            .fetch_run_log(run_id)
            .await
            .map_err(|e| WorkflowError::results(run_id, e))
    }

    /// Saving logs is a debugging aid; failing to save never fails the call.
    fn keep_logs(
        &self,
        run_id: RunId,
        log: &RunLog,
        save: bool,
        reporter: &impl ProgressReporter,
    ) {
        if !save {
            return;
        }
        match self.archive.save(run_id, log) {
            Ok(path) => reporter.success(&format!("Logs saved to {}", path.display())),
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "could not save logs");
                reporter.warn(&format!("Could not save logs: {e}"));
            }
        }
    }
}

fn correlation_options(polling: &PollingConfig, cancel_on_interrupt: bool) -> CorrelationOptions {
    CorrelationOptions {
        initial_delay: polling.correlation_initial_delay(),
        interval: polling.correlation_interval(),
        timeout: polling.correlation_timeout(),
        clock_skew: polling.clock_skew(),
        cancel_on_interrupt,
    }
}

fn non_empty(what: &str, value: &str) -> Result<(), WorkflowError> {
    if value.trim().is_empty() {
        return Err(WorkflowError::InvalidRequest(format!("{what} must not be empty")));
    }
    Ok(())
}

fn run_found(handle: &RunHandle) -> String {
    match handle.run_id() {
        Some(id) => format!("Found run {id} of {}", handle.workflow),
        None => format!("Dispatched {}", handle.workflow),
    }
}

fn warn_incomplete(run_id: RunId, missing: &[&str], reporter: &impl ProgressReporter) {
    if missing.is_empty() {
        return;
    }
    warn!(run_id = %run_id, missing = ?missing, "run succeeded but did not report every result field");
    reporter.warn(&format!(
        "Run {run_id} did not report: {} (shown as unknown)",
        missing.join(", ")
    ));
}

/// Reporter for calls that have no user to report to.
struct Silent;

impl ProgressReporter for Silent {
    fn step(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}
