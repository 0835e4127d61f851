//! Command implementations

pub mod codesign;
pub mod details;
pub mod instance_types;
pub mod list;
pub mod start;
pub mod status;
pub mod stop;
pub mod version;

use std::time::Duration;

/// `--timeout-minutes` as a poll timeout; `None` keeps the configured one.
#[must_use]
pub fn timeout_from_minutes(minutes: Option<u64>) -> Option<Duration> {
    minutes.map(|m| Duration::from_secs(m.saturating_mul(60)))
}
