//! JSON output helpers.
//!
//! Every `--json` code path prints exactly one pretty-printed document on
//! stdout: the command's result, or an error object when it fails.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::WorkflowError;

/// Renders results as pretty-printed JSON.
pub struct JsonRenderer;

impl JsonRenderer {
    /// Print `value` as one JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", to_pretty(value)?);
        Ok(())
    }
}

/// Serialize `value` for output.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("JSON serialization failed")
}

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "...",
///   "run_id": 123
/// }
/// ```
///
/// `run_id` is present only when the failure concerns a known run.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(err: &anyhow::Error) -> Result<String> {
    let workflow = err.downcast_ref::<WorkflowError>();
    let code = workflow.map_or("error", WorkflowError::code);
    let mut obj = serde_json::json!({
        "error": true,
        "message": format!("{err:#}"),
        "code": code,
    });
    if let Some(run_id) = workflow.and_then(WorkflowError::run_id) {
        obj["run_id"] = serde_json::json!(run_id.0);
    }
    to_pretty(&obj)
}
