//! `pushbutan codesign`: sign packages through the signing workflow.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::orchestrator::{RunOptions, SignRequest};
use crate::commands::timeout_from_minutes;

/// Arguments for the codesign command.
#[derive(Args, Debug)]
pub struct CodesignArgs {
    /// Signing certificate to use
    #[arg(long)]
    pub cert: String,

    /// Channel holding the packages to sign
    #[arg(long)]
    pub channel: String,

    /// Glob selecting which packages to sign
    #[arg(long, default_value = "*")]
    pub package_filter: String,

    /// Regenerate repodata after signing
    #[arg(long)]
    pub generate_repodata: bool,

    /// Download the signed packages here
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Save the run's logs under the configured logs directory
    #[arg(long)]
    pub save_logs: bool,

    /// Stop waiting after this many minutes
    #[arg(long)]
    pub timeout_minutes: Option<u64>,
}

impl CodesignArgs {
    #[must_use]
    pub fn request(&self) -> SignRequest {
        SignRequest {
            channel: self.channel.clone(),
            package_filter: self.package_filter.clone(),
            cert: self.cert.clone(),
            generate_repodata: self.generate_repodata,
            download_dir: self.download_dir.clone(),
        }
    }
}

/// Run `pushbutan codesign`.
///
/// # Errors
///
/// Returns an error if signing fails, times out or the download fails.
pub async fn run(app: &AppContext, args: CodesignArgs) -> Result<ExitCode> {
    let engine = app.engine()?;
    let opts = RunOptions {
        save_logs: args.save_logs,
        timeout: timeout_from_minutes(args.timeout_minutes),
        ..RunOptions::default()
    };
    let result = {
        let reporter = app.reporter();
        engine.sign_package(&args.request(), &opts, &reporter).await?
    };
    app.renderer().sign(&result)?;
    Ok(ExitCode::SUCCESS)
}
