//! `pushbutan instance-types`: the GPU instance types the launch workflow accepts.

use std::process::ExitCode;

use anyhow::Result;
use pushbutan_common::InstanceType;

use crate::app::AppContext;

/// # Errors
///
/// Returns an error only if JSON serialization fails.
pub fn run(app: &AppContext) -> Result<ExitCode> {
    app.renderer().instance_types(&InstanceType::ALL)?;
    Ok(ExitCode::SUCCESS)
}
