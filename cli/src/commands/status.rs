//! `pushbutan status`

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use pushbutan_common::JobStatusReport;

use crate::app::AppContext;
use crate::domain::RunId;

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Workflow run id
    pub run_id: u64,
}

/// Show the coarse state of a run. A failed run exits non-zero.
///
/// # Errors
///
/// Returns an error if the status cannot be fetched.
pub async fn run(app: &AppContext, args: StatusArgs) -> Result<ExitCode> {
    let engine = app.engine()?;
    let run_id = RunId(args.run_id);
    let report = engine.run_status(run_id).await?;
    app.renderer().status(run_id, &report)?;
    Ok(match report {
        JobStatusReport::Failed { .. } => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}
