use serde::{Deserialize, Serialize};

/// counts of what an import created, plus the snapshot it took.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub feed_id: String,
    pub agencies: usize,
    pub stops: usize,
    pub routes: usize,
    pub route_types: usize,
    pub calendars: usize,
    pub inferred_calendars: usize,
    pub exceptions: usize,
    pub trip_patterns: usize,
    pub trips: usize,
    pub stop_times: usize,
    pub frequency_trips: usize,
    pub fares: usize,
    pub snapshot_version: u32,
}
