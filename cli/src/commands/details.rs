//! `pushbutan details`: instance details from a finished launch run.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::domain::RunId;

/// Arguments for the details command.
#[derive(Args, Debug)]
pub struct DetailsArgs {
    /// Run id of a dev-instance launch
    pub run_id: u64,

    /// Save the run's logs under the configured logs directory
    #[arg(long)]
    pub save_logs: bool,
}

/// # Errors
///
/// Returns an error if the run is unfinished, failed, or cannot be read.
pub async fn run(app: &AppContext, args: DetailsArgs) -> Result<ExitCode> {
    let engine = app.engine()?;
    let run_id = RunId(args.run_id);
    let instance = engine.instance_details(run_id, args.save_logs).await?;
    app.renderer().details(run_id, &instance)?;
    Ok(ExitCode::SUCCESS)
}
