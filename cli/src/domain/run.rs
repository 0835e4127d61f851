//! Remote run state: ids, status snapshots, handles and logs.

use std::fmt;

use chrono::{DateTime, Utc};
use pushbutan_common::{JobStatusReport, TriggeredRun};
use serde::{Deserialize, Serialize};

/// Identifier of a single workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote run state, normalised from the API's `status` + `conclusion` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Success,
    Failure,
    Cancelled,
    TimedOut,
}

impl RunStatus {
    /// Map the API's `status`/`conclusion` strings.
    ///
    /// A completed run with any conclusion other than success, cancelled or
    /// timed out (`failure`, `startup_failure`, `neutral`, `skipped`, ...)
    /// counts as a failure: none of them produce a usable result.
    #[must_use]
    pub fn from_api(status: &str, conclusion: Option<&str>) -> Self {
        match status {
            "completed" => match conclusion {
                Some("success") => RunStatus::Success,
                Some("cancelled") => RunStatus::Cancelled,
                Some("timed_out") => RunStatus::TimedOut,
                _ => RunStatus::Failure,
            },
            "in_progress" => RunStatus::InProgress,
            _ => RunStatus::Queued,
        }
    }

    /// No further transition occurs from a terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Queued | RunStatus::InProgress)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
            RunStatus::Cancelled => "cancelled",
            RunStatus::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of a run. Each poll produces a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Raw `status` string as reported by the API.
    pub raw_status: String,
    pub conclusion: Option<String>,
    pub html_url: Option<String>,
}

impl RunSnapshot {
    #[must_use]
    pub fn new(run_id: RunId, raw_status: &str, conclusion: Option<&str>) -> Self {
        Self {
            run_id,
            status: RunStatus::from_api(raw_status, conclusion),
            raw_status: raw_status.to_string(),
            conclusion: conclusion.map(str::to_string),
            html_url: None,
        }
    }

    /// Conclusion for messages, falling back to the normalised status.
    #[must_use]
    pub fn conclusion_label(&self) -> &str {
        self.conclusion.as_deref().unwrap_or(self.status.as_str())
    }

    /// Coarse ready / in-progress / failed view for tool callers.
    #[must_use]
    pub fn to_report(&self) -> JobStatusReport {
        match self.status {
            RunStatus::Success => JobStatusReport::Ready {
                message: "Workflow completed successfully".to_string(),
            },
            s if s.is_terminal() => JobStatusReport::Failed {
                error: format!(
                    "Workflow failed with conclusion: {}",
                    self.conclusion_label()
                ),
            },
            _ => JobStatusReport::InProgress {
                workflow_status: self.raw_status.clone(),
                workflow_conclusion: self.conclusion.clone(),
            },
        }
    }
}

/// A run as it appears in the recent-runs listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub id: RunId,
    pub workflow_id: u64,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub status: RunStatus,
    pub event: String,
    pub head_branch: Option<String>,
    pub actor: Option<String>,
    /// Run title (`display_title`), which echoes `run-name` when configured.
    pub title: Option<String>,
}

/// Correlation state of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Dispatched; the resulting run has not been identified yet.
    Pending,
    Resolved(RunId),
    /// The correlation window closed without a match.
    Unresolved,
}

/// Ties one dispatch to (at most) one remote run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub workflow: String,
    pub dispatched_at: DateTime<Utc>,
    resolution: Resolution,
}

impl RunHandle {
    #[must_use]
    pub fn pending(workflow: impl Into<String>, dispatched_at: DateTime<Utc>) -> Self {
        Self {
            workflow: workflow.into(),
            dispatched_at,
            resolution: Resolution::Pending,
        }
    }

    /// Bind the handle to a run. A handle only ever resolves once.
    #[must_use]
    pub fn resolve(self, run_id: RunId) -> Self {
        match self.resolution {
            Resolution::Pending => Self {
                resolution: Resolution::Resolved(run_id),
                ..self
            },
            _ => self,
        }
    }

    #[must_use]
    pub fn unresolved(self) -> Self {
        match self.resolution {
            Resolution::Pending => Self {
                resolution: Resolution::Unresolved,
                ..self
            },
            _ => self,
        }
    }

    #[must_use]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    #[must_use]
    pub fn run_id(&self) -> Option<RunId> {
        match self.resolution {
            Resolution::Resolved(id) => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_triggered(&self) -> Option<TriggeredRun> {
        self.run_id().map(|id| TriggeredRun {
            run_id: id.0,
            workflow: self.workflow.clone(),
            dispatched_at: self.dispatched_at,
        })
    }
}

/// One text member of a run's log archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub name: String,
    pub content: String,
}

/// Logs of a run: the raw archive plus its decoded text members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLog {
    pub archive: Vec<u8>,
    pub files: Vec<LogFile>,
}

impl RunLog {
    /// All members joined in archive order.
    #[must_use]
    pub fn combined(&self) -> String {
        self.files
            .iter()
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Last `n` non-empty lines of the combined log.
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<String> {
        let combined = self.combined();
        let lines: Vec<&str> = combined.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(n);
        lines[start..].iter().map(|l| (*l).to_string()).collect()
    }
}

/// An artifact attached to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSummary {
    pub id: u64,
    pub name: String,
    pub size_in_bytes: u64,
    pub expired: bool,
}
