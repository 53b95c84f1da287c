use serde::{Deserialize, Serialize};

use super::{AttributeAvailability, Entity, PickupDropOffType, TripDirection};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub feed_id: String,
    pub gtfs_trip_id: Option<String>,
    pub trip_headsign: Option<String>,
    pub trip_short_name: Option<String>,
    pub block_id: Option<String>,
    pub route_id: String,
    pub pattern_id: String,
    pub calendar_id: String,
    pub trip_direction: Option<TripDirection>,
    pub use_frequency: bool,
    /// first departure of a frequency trip, seconds after midnight
    pub start_time: Option<i32>,
    /// last departure of a frequency trip, seconds after midnight
    pub end_time: Option<i32>,
    pub headway_secs: Option<i32>,
    pub wheelchair_boarding: AttributeAvailability,
    /// set when a pattern edit moved stop times so the times need review
    pub invalid: bool,
    /// one slot per pattern stop. `None` means the trip skips that stop.
    pub stop_times: Vec<Option<StopTime>>,
}

/// times are seconds after midnight and may exceed 24 hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTime {
    pub stop_id: String,
    pub arrival_time: Option<i32>,
    pub departure_time: Option<i32>,
    pub pickup_type: Option<PickupDropOffType>,
    pub drop_off_type: Option<PickupDropOffType>,
    pub stop_headsign: Option<String>,
}

impl StopTime {
    pub fn new(stop_id: &str, arrival_time: Option<i32>, departure_time: Option<i32>) -> StopTime {
        StopTime {
            stop_id: stop_id.to_string(),
            arrival_time,
            departure_time,
            pickup_type: None,
            drop_off_type: None,
            stop_headsign: None,
        }
    }
}

impl Trip {
    pub fn new(feed_id: &str, route_id: &str, pattern_id: &str, calendar_id: &str) -> Trip {
        Trip {
            id: super::new_id(),
            feed_id: feed_id.to_string(),
            gtfs_trip_id: None,
            trip_headsign: None,
            trip_short_name: None,
            block_id: None,
            route_id: route_id.to_string(),
            pattern_id: pattern_id.to_string(),
            calendar_id: calendar_id.to_string(),
            trip_direction: None,
            use_frequency: false,
            start_time: None,
            end_time: None,
            headway_secs: None,
            wheelchair_boarding: AttributeAvailability::Unknown,
            invalid: false,
            stop_times: vec![],
        }
    }

    /// id written to trips.txt, falling back to the internal id.
    pub fn gtfs_id(&self) -> String {
        match &self.gtfs_trip_id {
            Some(gtfs_id) if !gtfs_id.is_empty() => gtfs_id.clone(),
            _ => self.id.clone(),
        }
    }

    pub fn references_stop(&self, stop_id: &str) -> bool {
        self.stop_times
            .iter()
            .flatten()
            .any(|st| st.stop_id == stop_id)
    }
}

impl Entity for Trip {
    const TABLE: &'static str = "trips";

    fn id(&self) -> &str {
        &self.id
    }
}
