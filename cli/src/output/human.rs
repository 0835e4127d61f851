//! Human-readable terminal renderer.

use owo_colors::OwoColorize as _;
use pushbutan_common::{InstanceResult, InstanceType, JobStatusReport, SignResult, StopResult};

use crate::domain::{RunId, WorkflowSummary};
use crate::output::OutputContext;

/// Renders results as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    pub fn render_version(&self, version: &str) {
        self.ctx.info(&format!("pushbutan v{version}"));
    }

    pub fn render_workflows(&self, workflows: &[WorkflowSummary]) {
        if self.ctx.quiet {
            return;
        }
        if workflows.is_empty() {
            self.ctx.info("No workflows found.");
            return;
        }
        self.ctx.header("Available workflows:");
        for wf in workflows {
            println!(
                "  - {} (ID: {}) {} [{}]",
                wf.name,
                wf.id,
                wf.path.style(self.ctx.styles.dim),
                wf.state.style(self.ctx.styles.workflow_state(&wf.state))
            );
        }
    }

    pub fn render_instance_types(&self, types: &[InstanceType]) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.header("GPU instance types:");
        for t in types {
            println!("  - {t}");
        }
    }

    pub fn render_instance(&self, instance: &InstanceResult) {
        self.ctx.header("Instance ready!");
        self.instance_fields(instance);
    }

    pub fn render_details(&self, run_id: RunId, instance: &InstanceResult) {
        self.ctx.header(&format!("Instance from run {run_id}:"));
        self.instance_fields(instance);
    }

    fn instance_fields(&self, instance: &InstanceResult) {
        self.ctx.kv("Instance ID:  ", &instance.instance_id.to_string());
        self.ctx.kv("IP Address:   ", &instance.ip_address.to_string());
        self.ctx.kv("Instance Type:", &instance.instance_type.to_string());
        self.ctx.kv("Platform:     ", &instance.arch.to_string());
    }

    pub fn render_stop(&self, result: &StopResult) {
        self.ctx.success(&format!(
            "Instance {} stopped (run {})",
            result.instance_id, result.run_id
        ));
    }

    pub fn render_sign(&self, result: &SignResult) {
        self.ctx.header("Signing complete!");
        self.ctx.kv("Run:       ", &result.run_id.to_string());
        self.ctx.kv("Channel:   ", &result.channel);
        self.ctx.kv("Location:  ", &result.location.to_string());
        self.ctx.kv("Signed:    ", &result.signed_count.to_string());
        self.ctx.kv(
            "Repodata:  ",
            if result.repodata_generated { "generated" } else { "not requested" },
        );
        if !result.artifacts.is_empty() {
            self.ctx.kv("Artifacts: ", &result.artifacts.join(", "));
        }
        if !result.files.is_empty() {
            self.ctx.kv("Downloaded:", &format!("{} file(s)", result.files.len()));
            for file in &result.files {
                self.ctx.kv("           ", &file.display().to_string());
            }
        }
    }

    pub fn render_status(&self, run_id: RunId, report: &JobStatusReport) {
        match report {
            JobStatusReport::Ready { message } => {
                self.ctx.success(&format!("Run {run_id}: {message}"));
            }
            JobStatusReport::InProgress {
                workflow_status,
                workflow_conclusion,
            } => {
                let conclusion = workflow_conclusion.as_deref().unwrap_or("pending");
                self.ctx.info(&format!(
                    "Run {run_id}: {} (conclusion: {conclusion})",
                    workflow_status.style(self.ctx.styles.pending)
                ));
            }
            JobStatusReport::Failed { error } => {
                self.ctx.error(&format!("Run {run_id}: {error}"));
            }
        }
    }
}
