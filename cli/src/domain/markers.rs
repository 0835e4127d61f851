//! Result markers that remote jobs print into their logs.
//!
//! The log format is treated as a small wire protocol rather than free text.
//!
//! Grammar, version 1:
//!
//! ```text
//! log     = *line
//! line    = [timestamp SP] *(text / marker)
//! marker  = key "=" value      ; key must belong to the result kind
//! key     = lower *(lower / digit / "_")
//! value   = 1*non-space        ; surrounding quotes, commas, semicolons stripped
//! ```
//!
//! The provisioning job predates v1 and still prints these legacy forms,
//! which map onto v1 keys:
//!
//! ```text
//! INSTANCE_IDS: i-0123abcd      -> instance_id
//! [ "10.0.0.5" ]                -> ip_address
//! PLATFORM: linux-64            -> arch
//! INSTANCE_TYPE: g4dn.4xlarge   -> instance_type
//! ```
//!
//! Markers apply in stream order and the last occurrence of a key wins, so a
//! job can log placeholders early and reprint an authoritative summary at the
//! end. Empty values and the literal `unknown` are not recorded.

use std::collections::HashMap;
use std::sync::LazyLock;

use pushbutan_common::{Field, InstanceResult, UNKNOWN};
use regex::Regex;

/// GitHub prefixes every log line with an RFC 3339 timestamp.
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z\s?").expect("valid regex")
});

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"(?:^|[\s"'(\[,;])([a-z][a-z0-9_]*)=["']?([^\s,;"']+)"#).expect("valid regex")
});

static LEGACY_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    let re = |pattern: &str| Regex::new(pattern).expect("valid regex");
    vec![
        ("instance_id", re(r"INSTANCE_IDS:\s*(i-[0-9a-f]+)")),
        ("ip_address", re(r#"\[\s*"(\d{1,3}(?:\.\d{1,3}){3})"\s*\]"#)),
        ("arch", re(r"PLATFORM:\s*(\S+)")),
        ("instance_type", re(r"INSTANCE_TYPE:\s*(\S+)")),
    ]
});

/// Final value of each marker key seen in a log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerSet {
    values: HashMap<String, String>,
}

impl MarkerSet {
    /// Scan `log` for markers whose key is in `keys`.
    #[must_use]
    pub fn scan(log: &str, keys: &[&str]) -> Self {
        let mut set = Self::default();
        for line in log.lines() {
            let body = TIMESTAMP_RE
                .find(line)
                .map_or(line, |m| &line[m.end()..]);

            let mut found: Vec<(usize, &str, &str)> = Vec::new();
            for caps in MARKER_RE.captures_iter(body) {
                if let (Some(key), Some(value)) = (caps.get(1), caps.get(2))
                    && keys.contains(&key.as_str())
                {
                    found.push((key.start(), key.as_str(), value.as_str()));
                }
            }
            for (key, re) in LEGACY_RES.iter() {
                if !keys.contains(key) {
                    continue;
                }
                for caps in re.captures_iter(body) {
                    if let Some(value) = caps.get(1) {
                        found.push((value.start(), key, value.as_str()));
                    }
                }
            }

            found.sort_by_key(|(pos, _, _)| *pos);
            for (_, key, value) in found {
                set.record(key, value);
            }
        }
        set
    }

    fn record(&mut self, key: &str, raw: &str) {
        let value = raw.trim_matches(|c| matches!(c, '"' | '\'' | ',' | ';' | ')' | ']'));
        if value.is_empty() || value == UNKNOWN {
            return;
        }
        self.values.insert(key.to_string(), value.to_string());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Field {
        self.get(key).map(str::to_string).into()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A result kind that can be read from a run log.
pub trait Extract: Sized {
    /// Marker keys this kind reads.
    const KEYS: &'static [&'static str];

    fn from_markers(markers: &MarkerSet) -> Self;
}

/// Parse a run log into a typed result. Never fails: keys that never
/// appear come back as [`Field::Unknown`].
#[must_use]
pub fn extract<T: Extract>(log: &str) -> T {
    T::from_markers(&MarkerSet::scan(log, T::KEYS))
}

impl Extract for InstanceResult {
    const KEYS: &'static [&'static str] = &["instance_id", "ip_address", "instance_type", "arch"];

    fn from_markers(markers: &MarkerSet) -> Self {
        Self {
            instance_id: markers.field("instance_id"),
            ip_address: markers.field("ip_address"),
            instance_type: markers.field("instance_type"),
            arch: markers.field("arch"),
        }
    }
}

/// Markers printed by the code-signing job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignMarkers {
    pub location: Field,
    pub signed_count: Field,
}

impl Extract for SignMarkers {
    const KEYS: &'static [&'static str] = &["signed_location", "signed_count"];

    fn from_markers(markers: &MarkerSet) -> Self {
        Self {
            location: markers.field("signed_location"),
            signed_count: markers.field("signed_count"),
        }
    }
}
