use geo::Point;
use serde::{Deserialize, Serialize};

use super::{AttributeAvailability, Entity, LocationType, PickupDropOffType};

/// a stop or station. patterns and stop times refer to stops by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    pub feed_id: String,
    pub gtfs_stop_id: Option<String>,
    pub stop_code: Option<String>,
    pub stop_name: String,
    pub stop_desc: Option<String>,
    pub zone_id: Option<String>,
    pub stop_url: Option<String>,
    /// x = longitude, y = latitude
    pub location: Point<f64>,
    pub location_type: LocationType,
    pub parent_station: Option<String>,
    pub stop_timezone: Option<String>,
    pub wheelchair_boarding: AttributeAvailability,
    /// default pickup type for stop times at this stop
    pub pickup_type: Option<PickupDropOffType>,
    /// default drop off type for stop times at this stop
    pub drop_off_type: Option<PickupDropOffType>,
    pub major_stop: bool,
}

impl Stop {
    pub fn new(feed_id: &str, stop_name: &str, lon: f64, lat: f64) -> Stop {
        Stop {
            id: super::new_id(),
            feed_id: feed_id.to_string(),
            gtfs_stop_id: None,
            stop_code: None,
            stop_name: stop_name.to_string(),
            stop_desc: None,
            zone_id: None,
            stop_url: None,
            location: Point::new(lon, lat),
            location_type: LocationType::Stop,
            parent_station: None,
            stop_timezone: None,
            wheelchair_boarding: AttributeAvailability::Unknown,
            pickup_type: None,
            drop_off_type: None,
            major_stop: false,
        }
    }

    /// id written to stops.txt. stops created in the editor have no GTFS id yet.
    pub fn gtfs_id(&self) -> String {
        match &self.gtfs_stop_id {
            Some(gtfs_id) if !gtfs_id.is_empty() => gtfs_id.clone(),
            _ => format!("STOP_{}", self.id),
        }
    }

    pub fn lat(&self) -> f64 {
        self.location.y()
    }

    pub fn lon(&self) -> f64 {
        self.location.x()
    }
}

impl Entity for Stop {
    const TABLE: &'static str = "stops";

    fn id(&self) -> &str {
        &self.id
    }
}
