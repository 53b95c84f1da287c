use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use transit_editor_core::model::StatusType;

/// file/CLI facing configuration of a GTFS import. all fields are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    /// status given to every imported route. default: IN_PROGRESS
    pub route_status: Option<StatusType>,
    /// name of the snapshot taken after import. default: "Snapshot of <feed id>"
    pub snapshot_name: Option<String>,
    /// reference to the source feed version, recorded on the snapshot
    pub source_version_ref: Option<String>,
}

/// settings used by [`super::import_feed`].
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub route_status: StatusType,
    pub snapshot_name: Option<String>,
    pub source_version_ref: Option<String>,
    /// anchors the default validity window of services without any dates
    pub reference_date: NaiveDate,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions::from(&ImportConfig::default())
    }
}

impl From<&ImportConfig> for ImportOptions {
    fn from(config: &ImportConfig) -> Self {
        ImportOptions {
            route_status: config.route_status.unwrap_or_default(),
            snapshot_name: config.snapshot_name.clone(),
            source_version_ref: config.source_version_ref.clone(),
            reference_date: Utc::now().date_naive(),
        }
    }
}

impl ImportOptions {
    pub fn snapshot_name(&self, feed_id: &str) -> String {
        self.snapshot_name
            .clone()
            .unwrap_or_else(|| format!("Snapshot of {feed_id}"))
    }
}
