//! Identity types for agents and snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Snapshot identifier using UUIDv7 so ids sort by capture time.
pub type SnapshotId = Uuid;

/// Generate a new UUIDv7 SnapshotId.
pub fn new_snapshot_id() -> SnapshotId {
    Uuid::now_v7()
}

/// Normalized agent identity.
///
/// Backends report agents either as a bare id (`"123"`) or with the display
/// name glued on (`"123 - João"`). Both must land on the same key, so a key is
/// only ever built through [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AgentKey(String);

impl AgentKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the key is a pure run of ASCII digits.
    pub fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentKey {
    fn from(raw: &str) -> Self {
        normalize(raw)
    }
}

impl From<String> for AgentKey {
    fn from(raw: String) -> Self {
        normalize(&raw)
    }
}

impl From<AgentKey> for String {
    fn from(key: AgentKey) -> Self {
        key.0
    }
}

impl PartialOrd for AgentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Numeric keys sort by value and before non-numeric keys. The raw string is
/// the final tie-break so the ordering stays consistent with `Eq`.
impl Ord for AgentKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_numeric(), other.is_numeric()) {
            (true, true) => {
                let a = self.0.trim_start_matches('0');
                let b = other.0.trim_start_matches('0');
                a.len()
                    .cmp(&b.len())
                    .then_with(|| a.cmp(b))
                    .then_with(|| self.0.cmp(&other.0))
            }
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.0.cmp(&other.0),
        }
    }
}

/// Canonicalize a raw agent reference into an [`AgentKey`].
///
/// Returns the leading run of ASCII digits of the trimmed input, or the
/// trimmed input itself when it does not start with a digit. Never fails.
pub fn normalize(raw: &str) -> AgentKey {
    let trimmed = raw.trim();
    let digits = trimmed.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        AgentKey(trimmed[..digits].to_string())
    } else {
        AgentKey(trimmed.to_string())
    }
}

/// Extract the display name from an `"id - name"` reference, if any.
pub fn display_name(raw: &str) -> Option<&str> {
    raw.split_once(" - ")
        .map(|(_, name)| name.trim())
        .filter(|name| !name.is_empty())
}
