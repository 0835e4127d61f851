//! `pushbutan list`

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;

/// List workflows in the configured repository.
///
/// # Errors
///
/// Returns an error if the engine cannot be built or the listing fails.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let engine = app.engine()?;
    let workflows = engine.list_workflows().await?;
    app.renderer().workflows(&workflows)?;
    Ok(ExitCode::SUCCESS)
}
