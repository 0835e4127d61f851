//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, OutputFlags};
use crate::commands;

/// Dispatch and watch GitHub Actions workflows for GPU dev instances and
/// package signing
#[derive(Parser)]
#[command(
    name = "pushbutan",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List workflows in the repository
    List,

    /// List supported GPU instance types
    InstanceTypes,

    /// Launch a GPU dev instance and wait until it is up
    Start(commands::start::StartArgs),

    /// Tear down a dev instance
    Stop(commands::stop::StopArgs),

    /// Sign packages and optionally download the results
    Codesign(commands::codesign::CodesignArgs),

    /// Show the state of a workflow run
    Status(commands::status::StatusArgs),

    /// Show instance details from a finished launch run
    Details(commands::details::DetailsArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Default tracing filter for the chosen verbosity.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let app = AppContext::new(&OutputFlags {
            no_color: self.no_color,
            quiet: self.quiet,
            json: self.json,
        });
        match self.command {
            Command::List => commands::list::run(&app).await,
            Command::InstanceTypes => commands::instance_types::run(&app),
            Command::Start(args) => commands::start::run(&app, args).await,
            Command::Stop(args) => commands::stop::run(&app, args).await,
            Command::Codesign(args) => commands::codesign::run(&app, args).await,
            Command::Status(args) => commands::status::run(&app, args).await,
            Command::Details(args) => commands::details::run(&app, args).await,
            Command::Version => commands::version::run(&app),
        }
    }
}
