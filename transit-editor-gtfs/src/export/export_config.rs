use serde::{Deserialize, Serialize};

/// file/CLI facing configuration of a GTFS export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    /// export routes of any status instead of only approved routes. default: false
    pub ignore_route_status: Option<bool>,
}

/// settings used by [`super::export_feeds`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub ignore_route_status: bool,
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        ExportOptions {
            ignore_route_status: config.ignore_route_status.unwrap_or(false),
        }
    }
}
