use geo::{LineString, Point};
use transit_editor_core::model::{TripDirection, TripPattern, TripPatternStop};

use crate::feed::{StopTimeRecord, TripRecord};

/// trips of one route that visit the same stops in the same order and use the
/// same timetable mode (frequency based or not) share a pattern. routes never
/// share patterns, even with identical stop sequences.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternKey {
    pub route_id: String,
    pub use_frequency: bool,
    pub stop_ids: Vec<String>,
}

/// the stops and shape of a GTFS trip, resolved to editor ids.
pub struct PatternSource<'a> {
    pub trip: &'a TripRecord,
    pub stop_times: &'a [&'a StopTimeRecord],
    /// internal stop id per stop time
    pub stop_ids: &'a [String],
    /// location per stop time
    pub locations: &'a [Point<f64>],
    pub last_stop_name: &'a str,
    pub shape: Option<LineString<f64>>,
}

/// creates the pattern for the first trip seen with a new [`PatternKey`].
///
/// dwell times come from the trip's departure minus arrival, timepoints from the
/// GTFS timepoint column or else whether both times are given, and travel times
/// are interpolated along the pattern by [`interpolate_travel_times`].
pub fn build_pattern(feed_id: &str, key: &PatternKey, source: PatternSource) -> TripPattern {
    let headsign = source
        .trip
        .trip_headsign
        .clone()
        .filter(|h| !h.is_empty());
    let name = match &headsign {
        Some(headsign) => headsign.clone(),
        None => format!(
            "to {} ({} stops)",
            source.last_stop_name,
            source.stop_times.len()
        ),
    };
    let mut pattern = TripPattern::new(feed_id, &key.route_id, &name);
    pattern.headsign = headsign;
    pattern.shape = source.shape;
    pattern.use_frequency = key.use_frequency;
    pattern.pattern_direction = TripDirection::from_gtfs(source.trip.direction_id);
    pattern.pattern_stops = source
        .stop_times
        .iter()
        .zip(source.stop_ids.iter())
        .map(|(st, stop_id)| {
            let mut pattern_stop = TripPatternStop::new(stop_id);
            pattern_stop.timepoint = Some(match st.timepoint {
                Some(timepoint) => timepoint == 1,
                None => st.arrival_time.is_some() && st.departure_time.is_some(),
            });
            pattern_stop.default_dwell_time = match (st.arrival_time, st.departure_time) {
                (Some(arrival), Some(departure)) => departure - arrival,
                _ => 0,
            };
            pattern_stop
        })
        .collect();
    pattern.calc_shape_dist_traveled(source.locations);
    interpolate_travel_times(&mut pattern.pattern_stops, source.stop_times);
    pattern
}

/// sets default travel times from the timed stop times of a trip. the first stop
/// has travel time 0. across a run of untimed stops the time between the two
/// surrounding timed stops is split in proportion to shape distance, or evenly
/// when the stops have no distance between them.
pub fn interpolate_travel_times(
    pattern_stops: &mut [TripPatternStop],
    stop_times: &[&StopTimeRecord],
) {
    let Some(first) = pattern_stops.first_mut() else {
        return;
    };
    first.default_travel_time = 0;
    let n = pattern_stops.len().min(stop_times.len());
    let distances: Vec<f64> = pattern_stops
        .iter()
        .map(|ps| ps.shape_dist_traveled.unwrap_or_default())
        .collect();

    let mut start_of_block = 0;
    for i in 1..n {
        let Some(arrival) = stop_times[i].arrival_time else {
            continue;
        };
        let block_start = &stop_times[start_of_block];
        let Some(block_departure) = block_start.departure_time.or(block_start.arrival_time) else {
            start_of_block = i;
            continue;
        };
        let elapsed = (arrival - block_departure) as f64;
        let block_length = distances[i] - distances[start_of_block];
        let span = (i - start_of_block) as f64;
        for j in (start_of_block + 1)..=i {
            let share = if block_length > 0.0 {
                (distances[j] - distances[j - 1]) / block_length
            } else {
                1.0 / span
            };
            pattern_stops[j].default_travel_time = (elapsed * share).round() as i32;
        }
        start_of_block = i;
    }
}
