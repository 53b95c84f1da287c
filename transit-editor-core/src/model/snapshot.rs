use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// identifies a snapshot as (feed id, version).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotId {
    pub feed_id: String,
    pub version: u32,
}

impl SnapshotId {
    pub fn new(feed_id: &str, version: u32) -> SnapshotId {
        SnapshotId {
            feed_id: feed_id.to_string(),
            version,
        }
    }
}

impl Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.feed_id, self.version)
    }
}

impl FromStr for SnapshotId {
    type Err = String;

    /// parses "feed_id:version". feed ids may not contain ':'.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (feed_id, version) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("snapshot id '{s}' is not of the form feed_id:version"))?;
        let version = version
            .parse::<u32>()
            .map_err(|e| format!("snapshot id '{s}' has an invalid version: {e}"))?;
        Ok(SnapshotId::new(feed_id, version))
    }
}

/// metadata for a frozen copy of a feed. the frozen tables live in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub feed_id: String,
    pub version: u32,
    pub name: String,
    pub comment: Option<String>,
    pub current: bool,
    /// reference to the published feed version this snapshot was taken from
    pub feed_version_id: Option<String>,
    pub snapshot_time: DateTime<Utc>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
}

impl Snapshot {
    pub fn id(&self) -> SnapshotId {
        SnapshotId::new(&self.feed_id, self.version)
    }
}
