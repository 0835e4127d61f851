//! Workflow identity and dispatch requests.
//!
//! Pure types only, no I/O.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Numeric id or file name of a workflow definition.
///
/// The dispatch and run-listing endpoints accept either form in the URL path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowRef {
    Id(u64),
    File(String),
}

impl WorkflowRef {
    /// Whether a workflow reported by the remote (`id`, `path`) is this one.
    #[must_use]
    pub fn matches(&self, id: u64, path: &str) -> bool {
        match self {
            WorkflowRef::Id(expected) => *expected == id,
            WorkflowRef::File(file) => {
                path == file || path.rsplit('/').next().is_some_and(|name| name == file)
            }
        }
    }
}

impl fmt::Display for WorkflowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowRef::Id(id) => write!(f, "{id}"),
            WorkflowRef::File(file) => f.write_str(file),
        }
    }
}

/// A workflow definition plus the git ref its runs are dispatched on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub workflow: WorkflowRef,

    #[serde(rename = "ref", default = "default_ref")]
    pub git_ref: String,

    /// Workflow input that the run title echoes back (through `run-name`).
    ///
    /// When set, every dispatch carries a fingerprint in this input and the
    /// correlator only accepts runs whose title contains it. GitHub rejects
    /// undeclared inputs, so leave this unset unless the workflow declares it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_input: Option<String>,
}

fn default_ref() -> String {
    "main".to_string()
}

impl WorkflowSpec {
    #[must_use]
    pub fn new(workflow: WorkflowRef) -> Self {
        Self {
            workflow,
            git_ref: default_ref(),
            correlation_input: None,
        }
    }
}

/// A workflow definition as listed by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub state: String,
}

/// Acknowledgement of a dispatch. The remote never returns a run id here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchAck {
    pub status: u16,
}

/// A workflow plus its named string inputs, in the order they were added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub workflow: WorkflowSpec,
    inputs: Vec<(String, String)>,
}

impl DispatchRequest {
    #[must_use]
    pub fn new(workflow: WorkflowSpec) -> Self {
        Self {
            workflow,
            inputs: Vec::new(),
        }
    }

    /// Add an input. A repeated key replaces the earlier value in place.
    #[must_use]
    pub fn input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.inputs.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.inputs.push((key, value));
        }
        self
    }

    #[must_use]
    pub fn inputs(&self) -> &[(String, String)] {
        &self.inputs
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inputs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Stable token derived from the workflow, ref, inputs and dispatch time.
    ///
    /// Inputs are hashed in key order so the token does not depend on the
    /// order they were added.
    #[must_use]
    pub fn fingerprint(&self, dispatched_at: DateTime<Utc>) -> String {
        let mut sorted: Vec<&(String, String)> = self.inputs.iter().collect();
        sorted.sort();

        let mut hasher = Sha256::new();
        hasher.update(self.workflow.workflow.to_string().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.workflow.git_ref.as_bytes());
        hasher.update(b"\n");
        for (k, v) in sorted {
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
            hasher.update(b"\n");
        }
        let nanos = dispatched_at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| i64::from(dispatched_at.timestamp_subsec_nanos()));
        hasher.update(nanos.to_be_bytes());

        hasher
            .finalize()
            .iter()
            .take(8)
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// The request as actually sent: with the correlation token added when
    /// the workflow declares a correlation input.
    #[must_use]
    pub fn tagged(&self, token: &str) -> DispatchRequest {
        match &self.workflow.correlation_input {
            Some(name) => self.clone().input(name.clone(), token),
            None => self.clone(),
        }
    }

    /// `key=value` pairs joined for diagnostics.
    #[must_use]
    pub fn describe_inputs(&self) -> String {
        self.inputs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
