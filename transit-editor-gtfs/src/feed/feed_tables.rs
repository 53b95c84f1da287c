use std::collections::BTreeMap;

use geo::{Coord, LineString};
use itertools::Itertools;

use super::records::*;
use crate::gtfs_error::GtfsError;

/// the canonical GTFS tables of one feed, read from or written to a GTFS
/// directory or archive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedTables {
    pub agencies: Vec<AgencyRecord>,
    pub stops: Vec<StopRecord>,
    pub routes: Vec<RouteRecord>,
    pub trips: Vec<TripRecord>,
    pub stop_times: Vec<StopTimeRecord>,
    pub calendars: Vec<CalendarRecord>,
    pub calendar_dates: Vec<CalendarDateRecord>,
    pub shapes: Vec<ShapePointRecord>,
    pub frequencies: Vec<FrequencyRecord>,
    pub fare_attributes: Vec<FareAttributeRecord>,
    pub fare_rules: Vec<FareRuleRecord>,
    pub feed_info: Vec<FeedInfoRecord>,
}

impl FeedTables {
    /// groups stop times by trip, each list sorted by stop_sequence.
    ///
    /// # Returns
    ///
    /// the grouped stop times, or an error if a trip repeats a stop_sequence value.
    pub fn stop_times_by_trip(&self) -> Result<BTreeMap<&str, Vec<&StopTimeRecord>>, GtfsError> {
        let mut grouped: BTreeMap<&str, Vec<&StopTimeRecord>> = BTreeMap::new();
        for stop_time in self.stop_times.iter() {
            grouped
                .entry(stop_time.trip_id.as_str())
                .or_default()
                .push(stop_time);
        }
        for (trip_id, stop_times) in grouped.iter_mut() {
            stop_times.sort_by_key(|st| st.stop_sequence);
            if let Some((a, _)) = stop_times
                .iter()
                .tuple_windows()
                .find(|(a, b)| a.stop_sequence == b.stop_sequence)
            {
                return Err(GtfsError::MalformedGtfs(format!(
                    "trip {trip_id} has more than one stop time with stop_sequence {}",
                    a.stop_sequence
                )));
            }
        }
        Ok(grouped)
    }

    /// builds one line string per shape_id from its points sorted by sequence.
    /// shapes with fewer than two points are dropped.
    pub fn shape_lines(&self) -> BTreeMap<&str, LineString<f64>> {
        self.shapes
            .iter()
            .into_group_map_by(|p| p.shape_id.as_str())
            .into_iter()
            .filter_map(|(shape_id, points)| {
                let coords = points
                    .into_iter()
                    .sorted_by_key(|p| p.shape_pt_sequence)
                    .map(|p| Coord {
                        x: p.shape_pt_lon,
                        y: p.shape_pt_lat,
                    })
                    .collect_vec();
                if coords.len() < 2 {
                    log::warn!("shape {shape_id} has fewer than two points, ignoring it");
                    None
                } else {
                    Some((shape_id, LineString::new(coords)))
                }
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.agencies.is_empty()
            && self.stops.is_empty()
            && self.routes.is_empty()
            && self.trips.is_empty()
            && self.stop_times.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn stop_time(trip_id: &str, stop_id: &str, seq: u32) -> StopTimeRecord {
        StopTimeRecord {
            trip_id: trip_id.to_string(),
            arrival_time: None,
            departure_time: None,
            stop_id: stop_id.to_string(),
            stop_sequence: seq,
            stop_headsign: None,
            pickup_type: None,
            drop_off_type: None,
            shape_dist_traveled: None,
            timepoint: None,
        }
    }

    #[test]
    fn test_stop_times_sorted_by_sequence() {
        let tables = FeedTables {
            stop_times: vec![
                stop_time("t1", "C", 30),
                stop_time("t2", "X", 1),
                stop_time("t1", "A", 5),
                stop_time("t1", "B", 10),
            ],
            ..Default::default()
        };
        let grouped = tables.stop_times_by_trip().unwrap();
        let stops = grouped["t1"].iter().map(|st| st.stop_id.as_str()).collect_vec();
        assert_eq!(stops, vec!["A", "B", "C"]);
        assert_eq!(grouped["t2"].len(), 1);
    }

    #[test]
    fn test_repeated_sequence_is_malformed() {
        let tables = FeedTables {
            stop_times: vec![stop_time("t1", "A", 1), stop_time("t1", "B", 1)],
            ..Default::default()
        };
        assert!(matches!(
            tables.stop_times_by_trip(),
            Err(GtfsError::MalformedGtfs(_))
        ));
    }

    #[test]
    fn test_shape_lines() {
        let point = |seq: u32, lon: f64| ShapePointRecord {
            shape_id: String::from("s1"),
            shape_pt_lat: 40.0,
            shape_pt_lon: lon,
            shape_pt_sequence: seq,
            shape_dist_traveled: None,
        };
        let tables = FeedTables {
            shapes: vec![point(2, -105.1), point(1, -105.0), point(3, -105.2)],
            ..Default::default()
        };
        let lines = tables.shape_lines();
        let xs = lines["s1"].coords().map(|c| c.x).collect_vec();
        assert_eq!(xs, vec![-105.0, -105.1, -105.2]);
    }
}
