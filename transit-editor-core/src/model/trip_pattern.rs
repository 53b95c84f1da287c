use geo::{LineString, Point};
use serde::{Deserialize, Serialize};

use super::{Entity, TripDirection};
use crate::util::geo_utils;

/// a stop snapped further than this from the pattern shape makes the shape
/// unusable for measuring distances.
const MAX_SHAPE_OFFSET_METERS: f64 = 1000.0;

/// an ordered sequence of stops shared by trips of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripPattern {
    pub id: String,
    pub feed_id: String,
    pub route_id: String,
    pub name: String,
    pub headsign: Option<String>,
    pub shape: Option<LineString<f64>>,
    /// set when shape distances are measured stop to stop rather than along the shape
    pub use_straight_line_distances: bool,
    pub use_frequency: bool,
    pub pattern_direction: Option<TripDirection>,
    pub pattern_stops: Vec<TripPatternStop>,
}

/// one position in a [`TripPattern`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripPatternStop {
    pub stop_id: String,
    /// seconds from departing the previous stop to arriving here
    pub default_travel_time: i32,
    /// seconds spent at this stop
    pub default_dwell_time: i32,
    /// meters along the pattern
    pub shape_dist_traveled: Option<f64>,
    pub timepoint: Option<bool>,
}

impl TripPatternStop {
    pub fn new(stop_id: &str) -> TripPatternStop {
        TripPatternStop {
            stop_id: stop_id.to_string(),
            default_travel_time: 0,
            default_dwell_time: 0,
            shape_dist_traveled: None,
            timepoint: None,
        }
    }
}

impl TripPattern {
    pub fn new(feed_id: &str, route_id: &str, name: &str) -> TripPattern {
        TripPattern {
            id: super::new_id(),
            feed_id: feed_id.to_string(),
            route_id: route_id.to_string(),
            name: name.to_string(),
            headsign: None,
            shape: None,
            use_straight_line_distances: false,
            use_frequency: false,
            pattern_direction: None,
            pattern_stops: vec![],
        }
    }

    pub fn stop_ids(&self) -> Vec<&str> {
        self.pattern_stops
            .iter()
            .map(|ps| ps.stop_id.as_str())
            .collect()
    }

    pub fn references_stop(&self, stop_id: &str) -> bool {
        self.pattern_stops.iter().any(|ps| ps.stop_id == stop_id)
    }

    /// sets the shape_dist_traveled of every pattern stop. distances are measured
    /// along the shape when one exists and every stop lies close to it, and
    /// straight from stop to stop otherwise.
    ///
    /// # Arguments
    ///
    /// * `locations` - location of each pattern stop, in pattern order
    pub fn calc_shape_dist_traveled(&mut self, locations: &[Point<f64>]) {
        if locations.len() != self.pattern_stops.len() {
            log::warn!(
                "pattern {} has {} stops but {} locations were provided, skipping distance calculation",
                self.id,
                self.pattern_stops.len(),
                locations.len()
            );
            return;
        }
        let along_shape = self
            .shape
            .as_ref()
            .and_then(|shape| distances_along_shape(shape, locations));
        let distances = match along_shape {
            Some(distances) => {
                self.use_straight_line_distances = false;
                distances
            }
            None => {
                self.use_straight_line_distances = true;
                geo_utils::straight_line_distances(locations)
            }
        };
        for (pattern_stop, distance) in self.pattern_stops.iter_mut().zip(distances) {
            pattern_stop.shape_dist_traveled = Some(distance);
        }
    }
}

/// snaps stops onto the shape in order. returns None if any stop is too far
/// from the shape for the shape to be trusted.
fn distances_along_shape(shape: &LineString<f64>, locations: &[Point<f64>]) -> Option<Vec<f64>> {
    let coord_distances = geo_utils::get_coord_distances(shape);
    let mut result = Vec::with_capacity(locations.len());
    let mut min_segment = 0;
    let mut previous = 0.0_f64;
    for location in locations {
        let projection = geo_utils::project_onto_line(shape, &coord_distances, *location, min_segment)?;
        if projection.offset > MAX_SHAPE_OFFSET_METERS {
            return None;
        }
        min_segment = projection.segment;
        previous = previous.max(projection.distance_along);
        result.push(previous);
    }
    Some(result)
}

impl Entity for TripPattern {
    const TABLE: &'static str = "trip_patterns";

    fn id(&self) -> &str {
        &self.id
    }
}
