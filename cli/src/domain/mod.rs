//! Domain layer: pure types and logic for dispatching and watching runs.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod correlation;
pub mod error;
pub mod markers;
pub mod retry;
pub mod run;
pub mod workflow;

pub use config::PushbutanConfig;
pub use error::{ApiError, ConfigError, WorkflowError};
pub use markers::{Extract, MarkerSet, SignMarkers, extract};
pub use retry::RetryPolicy;
pub use run::{
    ArtifactSummary, LogFile, Resolution, RunHandle, RunId, RunLog, RunSnapshot, RunStatus,
    RunSummary,
};
pub use workflow::{DispatchAck, DispatchRequest, WorkflowRef, WorkflowSpec, WorkflowSummary};
