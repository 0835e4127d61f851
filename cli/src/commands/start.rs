//! `pushbutan start`: launch a GPU dev instance and wait for it.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use pushbutan_common::{InstanceType, Os};

use crate::app::{AppContext, interrupt_on_ctrl_c};
use crate::application::services::orchestrator::{RunOptions, StartRequest};
use crate::commands::timeout_from_minutes;

/// Arguments for the start command.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// EC2 instance type
    #[arg(long, value_enum, default_value = "g4dn.4xlarge")]
    pub instance_type: InstanceType,

    /// Hours before the instance terminates itself
    #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u32).range(1..))]
    pub lifetime: u32,

    /// Launch a Windows instance
    #[arg(long, conflicts_with = "linux")]
    pub windows: bool,

    /// Launch a Linux instance (default)
    #[arg(long)]
    pub linux: bool,

    /// Branch of the provisioning scripts
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Save the run's logs under the configured logs directory
    #[arg(long)]
    pub save_logs: bool,

    /// Give up (and cancel the launch) after this many minutes
    #[arg(long)]
    pub timeout_minutes: Option<u64>,
}

impl StartArgs {
    #[must_use]
    pub fn os(&self) -> Os {
        if self.windows { Os::Windows } else { Os::Linux }
    }

    #[must_use]
    pub fn request(&self) -> StartRequest {
        StartRequest {
            os: self.os(),
            instance_type: self.instance_type,
            lifetime_hours: self.lifetime,
            branch: self.branch.clone(),
        }
    }
}

/// Run `pushbutan start`.
///
/// Ctrl-C cancels the remote run before returning.
///
/// # Errors
///
/// Returns an error if the launch fails, times out or is interrupted.
pub async fn run(app: &AppContext, args: StartArgs) -> Result<ExitCode> {
    let engine = app.engine()?;
    let opts = RunOptions {
        save_logs: args.save_logs,
        timeout: timeout_from_minutes(args.timeout_minutes),
        interrupt: interrupt_on_ctrl_c(),
    };
    let instance = {
        let reporter = app.reporter();
        engine.start_instance(&args.request(), &opts, &reporter).await?
    };
    app.renderer().instance(&instance)?;
    Ok(ExitCode::SUCCESS)
}
