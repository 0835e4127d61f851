//! MCP tool implementations for the pushbutan tool server.
//!
//! Exposes six tools via the `rmcp` `#[tool]` macro:
//!   - `list_gpu_instance_types`
//!   - `list_workflows`
//!   - `start_gpu_instance`
//!   - `stop_instance`
//!   - `get_instance_details`
//!   - `get_job_status`
//!
//! Start and stop only dispatch and resolve the run; callers follow up with
//! `get_job_status` and `get_instance_details`, since a launch outlives any
//! reasonable tool-call timeout.

use std::sync::Arc;

use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::ServerInfo,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use pushbutan_cli::application::services::orchestrator::{Pushbutan, StartRequest};
use pushbutan_cli::domain::{RunHandle, RunId};
use pushbutan_cli::infra::github::GithubClient;
use pushbutan_cli::output::TracingReporter;
use pushbutan_common::{InstanceType, Os, TriggeredRun};

// ===================================================================
// Input structs
// ===================================================================

/// Input parameters for the `start_gpu_instance` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StartGpuInstanceInput {
    /// `linux` (default) or `windows`.
    pub os: Option<String>,
    /// `g4dn.4xlarge` (default) or `p3.2xlarge`.
    pub instance_type: Option<String>,
    /// Hours before the instance terminates itself (default 24).
    pub lifetime_hours: Option<u32>,
    /// Branch of the provisioning scripts (default `main`).
    pub branch: Option<String>,
}

/// Input parameters for the `stop_instance` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StopInstanceInput {
    /// EC2 instance id as reported by `get_instance_details`.
    pub instance_id: String,
}

/// Input parameters for the run-scoped tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunIdInput {
    /// Workflow run id returned by `start_gpu_instance`.
    pub run_id: u64,
}

// ===================================================================
// Output structs
// ===================================================================

/// Output returned by the `list_gpu_instance_types` tool.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceTypesOutput {
    pub instance_types: Vec<String>,
}

// ===================================================================
// PushbutanTools: the MCP server handler
// ===================================================================

/// MCP server handler sharing one engine across sessions, so concurrent
/// dispatches from different sessions never claim the same run.
#[derive(Clone)]
pub struct PushbutanTools {
    engine: Arc<Pushbutan<GithubClient>>,
    tool_router: ToolRouter<Self>,
}

impl std::fmt::Debug for PushbutanTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushbutanTools")
            .field("engine", &"<Pushbutan>")
            .finish()
    }
}

impl PushbutanTools {
    pub fn new(engine: Arc<Pushbutan<GithubClient>>) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }
}

// -------------------------------------------------------------------
// Tool implementations
// -------------------------------------------------------------------

#[tool_router]
impl PushbutanTools {
    #[tool(description = "List the GPU instance types that can be launched.")]
    async fn list_gpu_instance_types(&self) -> Result<String, String> {
        to_json(&instance_types())
    }

    #[tool(description = "List the workflows defined in the repository.")]
    async fn list_workflows(&self) -> Result<String, String> {
        let workflows = self
            .engine
            .list_workflows()
            .await
            .map_err(|e| e.to_string())?;
        to_json(&workflows)
    }

    /// Dispatch a launch and return as soon as its run id is known.
    #[tool(description = "Start a GPU dev instance. Returns the run id; \
        poll get_job_status until ready, then call get_instance_details.")]
    async fn start_gpu_instance(
        &self,
        params: Parameters<StartGpuInstanceInput>,
    ) -> Result<String, String> {
        let request = start_request(params.0)?;
        tracing::info!(os = %request.os, instance_type = %request.instance_type, "start requested");
        let handle = self
            .engine
            .trigger_instance(&request, &TracingReporter)
            .await
            .map_err(|e| e.to_string())?;
        to_json(&triggered(&handle)?)
    }

    #[tool(description = "Stop a dev instance by its instance id. \
        Returns the run id of the teardown workflow.")]
    async fn stop_instance(&self, params: Parameters<StopInstanceInput>) -> Result<String, String> {
        let instance_id = params.0.instance_id;
        tracing::info!(instance_id = %instance_id, "stop requested");
        let handle = self
            .engine
            .trigger_stop(&instance_id, &TracingReporter)
            .await
            .map_err(|e| e.to_string())?;
        to_json(&triggered(&handle)?)
    }

    #[tool(description = "Get instance id, IP address, instance type and platform \
        from a finished launch run.")]
    async fn get_instance_details(&self, params: Parameters<RunIdInput>) -> Result<String, String> {
        let instance = self
            .engine
            .instance_details(RunId(params.0.run_id), false)
            .await
            .map_err(|e| e.to_string())?;
        to_json(&instance)
    }

    #[tool(description = "Get the state of a workflow run: ready, in_progress or failed.")]
    async fn get_job_status(&self, params: Parameters<RunIdInput>) -> Result<String, String> {
        let report = self
            .engine
            .run_status(RunId(params.0.run_id))
            .await
            .map_err(|e| e.to_string())?;
        to_json(&report)
    }
}

// -------------------------------------------------------------------
// ServerHandler implementation (via tool_handler macro)
// -------------------------------------------------------------------

#[tool_handler]
impl ServerHandler for PushbutanTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "pushbutan: launch and stop GPU dev instances through GitHub Actions. \
                 Use start_gpu_instance, then get_job_status until ready, then \
                 get_instance_details."
                    .into(),
            ),
            ..Default::default()
        }
    }
}

// -------------------------------------------------------------------
// Helpers
// -------------------------------------------------------------------

fn instance_types() -> InstanceTypesOutput {
    InstanceTypesOutput {
        instance_types: InstanceType::ALL
            .iter()
            .map(|t| t.as_str().to_string())
            .collect(),
    }
}

/// Fill defaults and validate the enum-valued fields.
fn start_request(input: StartGpuInstanceInput) -> Result<StartRequest, String> {
    let defaults = StartRequest::default();
    let os = match input.os.as_deref() {
        None => defaults.os,
        Some(s) => s.parse::<Os>().map_err(|e| e.to_string())?,
    };
    let instance_type = match input.instance_type.as_deref() {
        None => defaults.instance_type,
        Some(s) => s.parse::<InstanceType>().map_err(|e| e.to_string())?,
    };
    Ok(StartRequest {
        os,
        instance_type,
        lifetime_hours: input.lifetime_hours.unwrap_or(defaults.lifetime_hours),
        branch: input.branch.unwrap_or(defaults.branch),
    })
}

fn triggered(handle: &RunHandle) -> Result<TriggeredRun, String> {
    handle
        .to_triggered()
        .ok_or_else(|| format!("run of {} was dispatched but never resolved", handle.workflow))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Serialization error: {e}"))
}
