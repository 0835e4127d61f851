//! Configuration schema stored in `~/.pushbutan/config.yaml`.
//!
//! Pure types only. Loading lives in `infra::config`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::retry::RetryPolicy;
use crate::domain::workflow::{WorkflowRef, WorkflowSpec};

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_OWNER: &str = "anaconda-distribution";
pub const DEFAULT_REPO: &str = "rocket-platform";
pub const DEV_INSTANCE_WORKFLOW_ID: u64 = 31_526_128;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration. Every field has a default, so an empty or
/// missing file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushbutanConfig {
    pub api_url: String,
    pub repository: RepositoryConfig,
    pub workflows: WorkflowsConfig,
    pub polling: PollingConfig,
    pub http: HttpConfig,
    /// Where `--save-logs` writes run logs.
    pub logs_dir: PathBuf,
}

impl Default for PushbutanConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            repository: RepositoryConfig::default(),
            workflows: WorkflowsConfig::default(),
            polling: PollingConfig::default(),
            http: HttpConfig::default(),
            logs_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub owner: String,
    pub name: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            name: DEFAULT_REPO.to_string(),
        }
    }
}

impl RepositoryConfig {
    /// `owner/name`, as used in API paths.
    #[must_use]
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// The three workflows the tool dispatches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowsConfig {
    pub dev_instance: WorkflowSpec,
    pub stop_instance: WorkflowSpec,
    pub codesign: WorkflowSpec,
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            dev_instance: WorkflowSpec::new(WorkflowRef::Id(DEV_INSTANCE_WORKFLOW_ID)),
            stop_instance: WorkflowSpec::new(WorkflowRef::File("stop-dev-instance.yml".into())),
            codesign: WorkflowSpec::new(WorkflowRef::File("codesign.yml".into())),
        }
    }
}

/// Poll and correlation timing, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub start_timeout_secs: u64,
    /// A teardown only runs the stop step, so it gets the same fifteen
    /// minutes as provisioning rather than the instance lifetime.
    pub stop_timeout_secs: u64,
    pub sign_timeout_secs: u64,
    pub correlation_timeout_secs: u64,
    pub correlation_interval_secs: u64,
    pub correlation_initial_delay_secs: u64,
    pub clock_skew_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            start_timeout_secs: 900,
            stop_timeout_secs: 900,
            sign_timeout_secs: 1800,
            correlation_timeout_secs: 90,
            correlation_interval_secs: 2,
            correlation_initial_delay_secs: 5,
            clock_skew_secs: 5,
        }
    }
}

impl PollingConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    #[must_use]
    pub fn sign_timeout(&self) -> Duration {
        Duration::from_secs(self.sign_timeout_secs)
    }

    #[must_use]
    pub fn correlation_timeout(&self) -> Duration {
        Duration::from_secs(self.correlation_timeout_secs)
    }

    #[must_use]
    pub fn correlation_interval(&self) -> Duration {
        Duration::from_secs(self.correlation_interval_secs)
    }

    #[must_use]
    pub fn correlation_initial_delay(&self) -> Duration {
        Duration::from_secs(self.correlation_initial_delay_secs)
    }

    #[must_use]
    pub fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }
}

/// HTTP client behaviour: retries, timeouts and the shared request budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_secs: u64,
    pub request_timeout_secs: u64,
    /// Token bucket capacity.
    pub burst: u32,
    /// Tokens added per second.
    pub refill_per_sec: f64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_base_ms: 1000,
            backoff_cap_secs: 30,
            request_timeout_secs: 30,
            burst: 10,
            refill_per_sec: 1.0,
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base: Duration::from_millis(self.backoff_base_ms),
            cap: Duration::from_secs(self.backoff_cap_secs),
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

impl PushbutanConfig {
    /// Reject values that would make the engine spin or never issue a call.
    ///
    /// # Errors
    ///
    /// Returns the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(invalid("api_url", &self.api_url, "an http(s) URL"));
        }
        if self.repository.owner.is_empty() || self.repository.name.is_empty() {
            return Err(invalid(
                "repository",
                &self.repository.slug(),
                "non-empty owner and name",
            ));
        }
        let positive = [
            ("polling.interval_secs", self.polling.interval_secs),
            (
                "polling.correlation_interval_secs",
                self.polling.correlation_interval_secs,
            ),
            ("http.max_attempts", u64::from(self.http.max_attempts)),
            ("http.burst", u64::from(self.http.burst)),
            ("http.request_timeout_secs", self.http.request_timeout_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(invalid(key, "0", "a value greater than zero"));
            }
        }
        if !(self.http.refill_per_sec.is_finite() && self.http.refill_per_sec > 0.0) {
            return Err(invalid(
                "http.refill_per_sec",
                &self.http.refill_per_sec.to_string(),
                "a positive number",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str, expected: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}
