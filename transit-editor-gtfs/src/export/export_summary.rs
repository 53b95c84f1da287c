use serde::{Deserialize, Serialize};

/// a trip left out of an export and the reason it was left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTrip {
    pub feed_id: String,
    pub trip_id: String,
    pub reason: String,
}

/// counts of the rows written by an export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub feeds: usize,
    pub agencies: usize,
    pub stops: usize,
    pub routes: usize,
    pub skipped_routes: usize,
    pub calendars: usize,
    pub calendar_dates: usize,
    pub trips: usize,
    pub stop_times: usize,
    pub frequencies: usize,
    pub shapes: usize,
    pub fares: usize,
    pub skipped_trips: Vec<SkippedTrip>,
}
