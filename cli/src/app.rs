//! Application context: unified state passed to every command handler.
//!
//! The engine is built on demand so that commands which never reach the
//! remote (`version`, `instance-types`) work without a credential.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::interrupt::{self, Interrupt};
use crate::application::ports::ConfigStore;
use crate::application::services::orchestrator::Pushbutan;
use crate::domain::PushbutanConfig;
use crate::infra::config::YamlConfigStore;
use crate::infra::credentials::Credentials;
use crate::infra::github::GithubClient;
use crate::infra::logs::FsLogArchive;
use crate::infra::rate_limit::TokenBucket;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer, TerminalReporter};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Context used for progress lines; always quiet in JSON mode so stdout
    /// carries exactly one document.
    progress: OutputContext,
    config_store: YamlConfigStore,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    #[must_use]
    pub fn new(flags: &OutputFlags) -> Self {
        let mode = if flags.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        Self {
            output: OutputContext::new(flags.no_color, flags.quiet),
            mode,
            progress: OutputContext::new(flags.no_color, flags.quiet || flags.json),
            config_store: YamlConfigStore,
        }
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Progress reporter for long-running operations.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.progress)
    }

    /// # Errors
    ///
    /// Returns an error if the config file exists but is invalid.
    pub fn load_config(&self) -> Result<PushbutanConfig> {
        self.config_store.load()
    }

    /// Load configuration and credentials and build the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or `GITHUB_TOKEN`
    /// is missing.
    pub fn engine(&self) -> Result<Pushbutan<GithubClient>> {
        connect(self.load_config()?)
    }
}

/// Build a production engine from a loaded configuration.
///
/// Reads the credential from the environment; its absence is fatal here,
/// before any remote call is made.
///
/// # Errors
///
/// Returns an error if `GITHUB_TOKEN` is missing or the HTTP client cannot
/// be constructed.
pub fn connect(config: PushbutanConfig) -> Result<Pushbutan<GithubClient>> {
    let credentials = Credentials::from_env()?;
    let limiter = Arc::new(TokenBucket::new(config.http.burst, config.http.refill_per_sec));
    let client = GithubClient::new(&config, &credentials, limiter)
        .context("cannot create GitHub client")?;
    let archive = Arc::new(FsLogArchive::new(config.logs_dir.clone()));
    tracing::debug!(repository = %config.repository.slug(), "engine ready");
    Ok(Pushbutan::new(client, config, archive))
}

/// Interrupt raised when the user presses Ctrl-C.
///
/// Must be called from within a tokio runtime.
#[must_use]
pub fn interrupt_on_ctrl_c() -> Interrupt {
    let (handle, interrupt) = interrupt::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            handle.raise();
        }
    });
    interrupt
}
