//! GitHub Actions implementation of the `WorkflowApi` port.
//!
//! Every request reserves a slot from the shared limiter, then goes through
//! one retry loop. Rate limits and transient failures are retried with
//! backoff; everything else is returned to the caller on the first failure.
//!
//! A dispatch is not idempotent: each accepted POST starts one more run. It
//! is only resent when the remote certainly did not act on it, meaning the
//! connection was never established or the call was refused for rate limiting.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::application::ports::{RequestLimiter, WorkflowApi};
use crate::domain::config::PushbutanConfig;
use crate::domain::{
    ApiError, ArtifactSummary, DispatchAck, DispatchRequest, RetryPolicy, RunId, RunLog,
    RunSnapshot, RunStatus, RunSummary, WorkflowRef, WorkflowSummary,
};
use crate::infra::archive;
use crate::infra::credentials::Credentials;

const API_VERSION: &str = "2022-11-28";
const RUNS_PER_PAGE: &str = "30";

/// Whether a failed request may be sent again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// Safe to repeat.
    Idempotent,
    /// Resend only if the previous attempt cannot have been acted on.
    AtMostOnce,
}

/// Client for one repository's Actions API.
pub struct GithubClient {
    http: reqwest::Client,
    base: String,
    token: String,
    retry: RetryPolicy,
    limiter: Arc<dyn RequestLimiter>,
}

impl GithubClient {
    /// Build a client for the configured repository.
    ///
    /// # Errors
    ///
    /// Returns `Transient` if the HTTP client cannot be constructed.
    pub fn new(
        config: &PushbutanConfig,
        credentials: &Credentials,
        limiter: Arc<dyn RequestLimiter>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pushbutan/", env!("CARGO_PKG_VERSION")))
            .timeout(config.http.request_timeout())
            .build()
            .map_err(|e| ApiError::Transient(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base: format!(
                "{}/repos/{}",
                config.api_url.trim_end_matches('/'),
                config.repository.slug()
            ),
            token: credentials.token().to_string(),
            retry: config.http.retry_policy(),
            limiter,
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }

    fn root_url(&self, path: &str) -> String {
        let root = self
            .base
            .rsplit_once("/repos/")
            .map_or(self.base.as_str(), |(root, _)| root);
        format!("{root}/{path}")
    }

    /// Send with limiter, classification and bounded retries.
    async fn send(
        &self,
        what: &str,
        builder: RequestBuilder,
        delivery: Delivery,
    ) -> Result<Response, ApiError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let wait = self.limiter.reserve();
            if !wait.is_zero() {
                debug!(what, wait_ms = wait.as_millis(), "waiting for request budget");
                tokio::time::sleep(wait).await;
            }

            let request = builder
                .try_clone()
                .ok_or_else(|| ApiError::Transient(format!("{what}: request cannot be retried")))?;
            debug!(what, attempt, "sending request");

            let (err, maybe_acted_on) = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let err = classify(response).await;
                    let refused = matches!(err, ApiError::RateLimited { .. });
                    (err, !refused)
                }
                Err(e) if e.is_decode() => (ApiError::Decode(e.to_string()), true),
                Err(e) => (ApiError::Transient(e.to_string()), !e.is_connect()),
            };

            if let ApiError::RateLimited { retry_after } = &err {
                self.limiter.penalize(*retry_after);
            }
            if !err.is_retryable() || !self.retry.allows_retry(attempt) {
                debug!(what, attempt, error = %err, "request failed");
                return Err(err);
            }
            if delivery == Delivery::AtMostOnce && maybe_acted_on {
                warn!(what, attempt, error = %err, "request may have been applied, not resending");
                return Err(err);
            }
            let delay = self.retry.delay_for(attempt, err.retry_after());
            warn!(
                what,
                attempt,
                delay_ms = delay.as_millis(),
                error = %err,
                "request failed, will retry"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, what: &str, url: &str) -> Result<T, ApiError> {
        let response = self
            .send(what, self.request(Method::GET, url), Delivery::Idempotent)
            .await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(format!("{what}: {e}")))
    }

    async fn get_bytes(&self, what: &str, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .send(what, self.request(Method::GET, url), Delivery::Idempotent)
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transient(format!("{what}: {e}")))?;
        Ok(bytes.to_vec())
    }
}

impl WorkflowApi for GithubClient {
    async fn authenticated_user(&self) -> Result<String, ApiError> {
        let user: UserItem = self.get_json("get user", &self.root_url("user")).await?;
        Ok(user.login)
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, ApiError> {
        let list: WorkflowList = self
            .get_json("list workflows", &self.repo_url("actions/workflows"))
            .await?;
        Ok(list.workflows)
    }

    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchAck, ApiError> {
        let url = self.repo_url(&format!(
            "actions/workflows/{}/dispatches",
            request.workflow.workflow
        ));
        let inputs: BTreeMap<&str, &str> = request
            .inputs()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let body = serde_json::json!({
            "ref": request.workflow.git_ref,
            "inputs": inputs,
        });
        let response = self
            .send(
                "dispatch workflow",
                self.request(Method::POST, &url).json(&body),
                Delivery::AtMostOnce,
            )
            .await?;
        let status = response.status().as_u16();
        info!(workflow = %request.workflow.workflow, status, "workflow dispatched");
        Ok(DispatchAck { status })
    }

    async fn fetch_recent_runs(
        &self,
        workflow: &WorkflowRef,
        since: DateTime<Utc>,
    ) -> Result<Vec<RunSummary>, ApiError> {
        let url = self.repo_url(&format!("actions/workflows/{workflow}/runs"));
        let created = format!(">={}", since.format("%Y-%m-%dT%H:%M:%SZ"));
        let builder = self.request(Method::GET, &url).query(&[
            ("event", "workflow_dispatch"),
            ("created", created.as_str()),
            ("per_page", RUNS_PER_PAGE),
        ]);
        let response = self.send("list runs", builder, Delivery::Idempotent).await?;
        let list: RunList = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("list runs: {e}")))?;
        Ok(list.workflow_runs.into_iter().map(RunItem::into_summary).collect())
    }

    async fn fetch_run_status(&self, run_id: RunId) -> Result<RunSnapshot, ApiError> {
        let run: RunItem = self
            .get_json("get run", &self.repo_url(&format!("actions/runs/{run_id}")))
            .await?;
        Ok(run.into_snapshot())
    }

    async fn fetch_run_log(&self, run_id: RunId) -> Result<RunLog, ApiError> {
        let bytes = self
            .get_bytes("download logs", &self.repo_url(&format!("actions/runs/{run_id}/logs")))
            .await?;
        let files = archive::text_members(&bytes)?;
        debug!(run_id = %run_id, members = files.len(), bytes = bytes.len(), "run log fetched");
        Ok(RunLog {
            archive: bytes,
            files,
        })
    }

    async fn list_artifacts(&self, run_id: RunId) -> Result<Vec<ArtifactSummary>, ApiError> {
        let list: ArtifactList = self
            .get_json(
                "list artifacts",
                &self.repo_url(&format!("actions/runs/{run_id}/artifacts")),
            )
            .await?;
        Ok(list
            .artifacts
            .into_iter()
            .map(|a| ArtifactSummary {
                id: a.id,
                name: a.name,
                size_in_bytes: a.size_in_bytes,
                expired: a.expired,
            })
            .collect())
    }

    async fn download_artifact(
        &self,
        artifact: &ArtifactSummary,
        dest: &Path,
    ) -> Result<Vec<PathBuf>, ApiError> {
        let url = self.repo_url(&format!("actions/artifacts/{}/zip", artifact.id));
        let bytes = self.get_bytes("download artifact", &url).await?;
        let target = dest.join(safe_dir_name(&artifact.name));
        archive::unpack(&bytes, &target)
    }

    async fn cancel_run(&self, run_id: RunId) -> Result<(), ApiError> {
        let url = self.repo_url(&format!("actions/runs/{run_id}/cancel"));
        self.send("cancel run", self.request(Method::POST, &url), Delivery::Idempotent)
            .await?;
        Ok(())
    }
}

// ── Response classification ───────────────────────────────────────────────────

/// Rate-limit related response headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RateHeaders {
    remaining: Option<u64>,
    retry_after: Option<Duration>,
}

fn rate_headers(headers: &HeaderMap, now: DateTime<Utc>) -> RateHeaders {
    let number = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };
    let remaining = number("x-ratelimit-remaining");
    let retry_after = number(RETRY_AFTER.as_str())
        .map(Duration::from_secs)
        .or_else(|| {
            let reset = i64::try_from(number("x-ratelimit-reset")?).ok()?;
            let secs = reset.saturating_sub(now.timestamp()).max(0);
            Some(Duration::from_secs(secs.unsigned_abs()))
        });
    RateHeaders {
        remaining,
        retry_after,
    }
}

async fn classify(response: Response) -> ApiError {
    let status = response.status();
    let rate = rate_headers(response.headers(), Utc::now());
    let body = response.text().await.unwrap_or_default();
    classify_status(status, rate, api_message(&body))
}

fn classify_status(status: StatusCode, rate: RateHeaders, message: String) -> ApiError {
    let code = status.as_u16();
    match code {
        401 => ApiError::Auth {
            status: code,
            message,
        },
        403 if rate.remaining == Some(0) || message.to_lowercase().contains("rate limit") => {
            ApiError::RateLimited {
                retry_after: rate.retry_after,
            }
        }
        403 => ApiError::Auth {
            status: code,
            message,
        },
        429 => ApiError::RateLimited {
            retry_after: rate.retry_after,
        },
        404 => ApiError::NotFound(message),
        408 | 500..=599 => ApiError::Transient(format!("HTTP {code}: {message}")),
        _ => ApiError::Rejected {
            status: code,
            message,
        },
    }
}

/// The `message` field of a GitHub error body, or the start of the raw body.
fn api_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => body.chars().take(200).collect::<String>().trim().to_string(),
    }
}

fn safe_dir_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "artifact".to_string(),
        rest => rest.to_string(),
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct UserItem {
    login: String,
}

#[derive(Deserialize)]
struct WorkflowList {
    workflows: Vec<WorkflowSummary>,
}

#[derive(Deserialize)]
struct RunList {
    workflow_runs: Vec<RunItem>,
}

#[derive(Deserialize)]
struct RunItem {
    id: u64,
    workflow_id: u64,
    #[serde(default)]
    path: String,
    created_at: DateTime<Utc>,
    status: Option<String>,
    conclusion: Option<String>,
    #[serde(default)]
    event: String,
    head_branch: Option<String>,
    actor: Option<ActorItem>,
    display_title: Option<String>,
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct ActorItem {
    login: String,
}

impl RunItem {
    fn raw_status(&self) -> &str {
        self.status.as_deref().unwrap_or("queued")
    }

    fn into_summary(self) -> RunSummary {
        RunSummary {
            id: RunId(self.id),
            workflow_id: self.workflow_id,
            status: RunStatus::from_api(self.raw_status(), self.conclusion.as_deref()),
            path: self.path,
            created_at: self.created_at,
            event: self.event,
            head_branch: self.head_branch,
            actor: self.actor.map(|a| a.login),
            title: self.display_title,
        }
    }

    fn into_snapshot(self) -> RunSnapshot {
        let mut snapshot =
            RunSnapshot::new(RunId(self.id), self.raw_status(), self.conclusion.as_deref());
        snapshot.html_url = self.html_url;
        snapshot
    }
}

#[derive(Deserialize)]
struct ArtifactList {
    artifacts: Vec<ArtifactItem>,
}

#[derive(Deserialize)]
struct ArtifactItem {
    id: u64,
    name: String,
    #[serde(default)]
    size_in_bytes: u64,
    #[serde(default)]
    expired: bool,
}
