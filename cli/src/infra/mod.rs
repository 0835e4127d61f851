//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: the GitHub HTTP client,
//! zip handling, log persistence, config and credential loading.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod archive;
pub mod config;
pub mod credentials;
pub mod github;
pub mod logs;
pub mod rate_limit;
