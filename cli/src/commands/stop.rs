//! `pushbutan stop`: tear down a dev instance.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::orchestrator::RunOptions;

/// Arguments for the stop command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Instance to stop, as reported by `start`
    pub instance_id: String,

    /// Save the run's logs under the configured logs directory
    #[arg(long)]
    pub save_logs: bool,
}

/// Run `pushbutan stop`.
///
/// # Errors
///
/// Returns an error if the stop workflow fails or times out.
pub async fn run(app: &AppContext, args: StopArgs) -> Result<ExitCode> {
    let engine = app.engine()?;
    let opts = RunOptions {
        save_logs: args.save_logs,
        ..RunOptions::default()
    };
    let result = {
        let reporter = app.reporter();
        engine.stop_instance(&args.instance_id, &opts, &reporter).await?
    };
    app.renderer().stop(&result)?;
    Ok(ExitCode::SUCCESS)
}
