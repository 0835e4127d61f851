//! Output formatting module

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize as _;
use pushbutan_common::{InstanceResult, InstanceType, JobStatusReport, SignResult, StopResult};

pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::{TerminalReporter, TracingReporter};
pub use styles::Styles;

use crate::domain::{RunId, WorkflowSummary};

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Check if progress indicators should be shown.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    /// Print a warning message prefixed with `⚠`. Suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "⚠".style(self.styles.warning));
        }
    }

    /// Print an error message prefixed with `✗` to stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Print a key-value pair with the key dimmed. Suppressed when `quiet`.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }
}

/// Human or JSON rendering, chosen once per invocation.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

impl Renderer<'_> {
    /// # Errors
    ///
    /// JSON serialization failure.
    pub fn workflows(&self, workflows: &[WorkflowSummary]) -> Result<()> {
        match self {
            Renderer::Human(r) => r.render_workflows(workflows),
            Renderer::Json(r) => r.render(workflows)?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// JSON serialization failure.
    pub fn instance_types(&self, types: &[InstanceType]) -> Result<()> {
        match self {
            Renderer::Human(r) => r.render_instance_types(types),
            Renderer::Json(r) => r.render(types)?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// JSON serialization failure.
    pub fn instance(&self, instance: &InstanceResult) -> Result<()> {
        match self {
            Renderer::Human(r) => r.render_instance(instance),
            Renderer::Json(r) => r.render(instance)?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// JSON serialization failure.
    pub fn details(&self, run_id: RunId, instance: &InstanceResult) -> Result<()> {
        match self {
            Renderer::Human(r) => r.render_details(run_id, instance),
            Renderer::Json(r) => r.render(instance)?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// JSON serialization failure.
    pub fn stop(&self, result: &StopResult) -> Result<()> {
        match self {
            Renderer::Human(r) => r.render_stop(result),
            Renderer::Json(r) => r.render(result)?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// JSON serialization failure.
    pub fn sign(&self, result: &SignResult) -> Result<()> {
        match self {
            Renderer::Human(r) => r.render_sign(result),
            Renderer::Json(r) => r.render(result)?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// JSON serialization failure.
    pub fn status(&self, run_id: RunId, report: &JobStatusReport) -> Result<()> {
        match self {
            Renderer::Human(r) => r.render_status(run_id, report),
            Renderer::Json(r) => r.render(report)?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// JSON serialization failure.
    pub fn version(&self, version: &str) -> Result<()> {
        match self {
            Renderer::Human(r) => r.render_version(version),
            Renderer::Json(r) => r.render(&serde_json::json!({ "version": version }))?,
        }
        Ok(())
    }
}
