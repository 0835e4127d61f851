//! Application layer: port trait definitions and use-case orchestration.
//!
//! This module depends only on `crate::domain`, never on `crate::infra`,
//! `crate::commands`, or `crate::output`.

pub mod interrupt;
pub mod ports;
pub mod services;

pub use interrupt::{Interrupt, InterruptHandle};
pub use ports::{ConfigStore, LogArchive, ProgressReporter, RequestLimiter, WorkflowApi};
pub use services::orchestrator::{Pushbutan, RunOptions, SignRequest, StartRequest};
