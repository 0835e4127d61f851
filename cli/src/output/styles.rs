//! Stylesheet for terminal output.

use owo_colors::Style;

/// Colors for message markers and workflow/run states. Every field is a
/// no-op style until `colorize` is called.
#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    /// Secondary text: paths, elapsed time, keys.
    pub dim: Style,
    pub header: Style,
    /// Runs that are queued or executing.
    pub pending: Style,
}

impl Styles {
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
        self.info = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.header = Style::new().bold().cyan();
        self.pending = Style::new().yellow();
    }

    /// Style for a workflow's `state` as listed by the API.
    #[must_use]
    pub fn workflow_state(&self, state: &str) -> Style {
        if state == "active" { self.success } else { self.dim }
    }
}
