use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Literal used on the wire for a value the remote job never reported.
pub const UNKNOWN: &str = "unknown";

/// Error returned when parsing one of the enums below from a string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// EC2 GPU instance types the provisioning workflow accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum InstanceType {
    #[default]
    #[serde(rename = "g4dn.4xlarge")]
    #[cfg_attr(feature = "clap", value(name = "g4dn.4xlarge"))]
    G4dn4xlarge,
    #[serde(rename = "p3.2xlarge")]
    #[cfg_attr(feature = "clap", value(name = "p3.2xlarge"))]
    P32xlarge,
}

impl InstanceType {
    pub const ALL: [InstanceType; 2] = [InstanceType::G4dn4xlarge, InstanceType::P32xlarge];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InstanceType::G4dn4xlarge => "g4dn.4xlarge",
            InstanceType::P32xlarge => "p3.2xlarge",
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InstanceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "instance type",
                value: s.to_string(),
                expected: "g4dn.4xlarge, p3.2xlarge",
            })
    }
}

/// Operating system flavour of a dev instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Os {
    #[default]
    Linux,
    Windows,
}

impl Os {
    /// Platform string the provisioning workflow expects in its `arch` input.
    #[must_use]
    pub fn arch(self) -> Arch {
        match self {
            Os::Linux => Arch::Linux64,
            Os::Windows => Arch::Win64,
        }
    }

    /// CUDA toolkit requested for this flavour. Windows images manage CUDA
    /// themselves, so the workflow receives `none`.
    #[must_use]
    pub fn cuda_version(self) -> &'static str {
        match self {
            Os::Linux => "12.4",
            Os::Windows => "none",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Os::Linux => "linux",
            Os::Windows => "windows",
        })
    }
}

impl FromStr for Os {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(Os::Linux),
            "windows" => Ok(Os::Windows),
            _ => Err(ParseEnumError {
                kind: "os",
                value: s.to_string(),
                expected: "linux, windows",
            }),
        }
    }
}

/// Conda-style platform identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    #[serde(rename = "linux-64")]
    Linux64,
    #[serde(rename = "win-64")]
    Win64,
}

impl Arch {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::Linux64 => "linux-64",
            Arch::Win64 => "win-64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value parsed out of a workflow run, or an explicit "unknown".
///
/// Serialised as the plain string, with `Unknown` written as `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field {
    Known(String),
    #[default]
    Unknown,
}

impl Field {
    #[must_use]
    pub fn known(&self) -> Option<&str> {
        match self {
            Field::Known(v) => Some(v),
            Field::Unknown => None,
        }
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        matches!(self, Field::Known(_))
    }
}

impl From<Option<String>> for Field {
    fn from(value: Option<String>) -> Self {
        value.map_or(Field::Unknown, Field::Known)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.known().unwrap_or(UNKNOWN))
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.known().unwrap_or(UNKNOWN))
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw {
            Some(v) if v != UNKNOWN && !v.is_empty() => Field::Known(v),
            _ => Field::Unknown,
        })
    }
}

/// Details of a provisioned dev instance
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstanceResult {
    pub instance_id: Field,
    pub ip_address: Field,
    pub instance_type: Field,
    pub arch: Field,
}

impl InstanceResult {
    /// Names of the fields the run never reported.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("instance_id", &self.instance_id),
            ("ip_address", &self.ip_address),
            ("instance_type", &self.instance_type),
            ("arch", &self.arch),
        ]
        .into_iter()
        .filter(|(_, field)| !field.is_known())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Outcome of a package signing run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignResult {
    pub run_id: u64,
    pub channel: String,
    /// Where the job published the signed packages.
    pub location: Field,
    /// Number of packages the job reports having signed.
    pub signed_count: Field,
    pub repodata_generated: bool,
    /// Names of the artifacts attached to the run.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Local files unpacked from those artifacts, when a download dir was given.
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl SignResult {
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [("location", &self.location), ("signed_count", &self.signed_count)]
            .into_iter()
            .filter(|(_, field)| !field.is_known())
            .map(|(name, _)| name)
            .collect()
    }
}

/// Outcome of a stop/teardown run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResult {
    pub run_id: u64,
    pub instance_id: String,
}

/// A dispatched run whose id has been resolved but which may still be running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredRun {
    pub run_id: u64,
    pub workflow: String,
    pub dispatched_at: DateTime<Utc>,
}

/// Coarse job state reported to tool callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatusReport {
    Ready {
        message: String,
    },
    InProgress {
        workflow_status: String,
        workflow_conclusion: Option<String>,
    },
    Failed {
        error: String,
    },
}
