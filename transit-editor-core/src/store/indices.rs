use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rstar::{primitives::GeomWithData, RTree, AABB};

use super::table_group::TableGroup;

/// (parent id, child id). ordering by parent first makes every child of a
/// parent one contiguous range.
pub type CompositeKey = (String, String);

type StopLocation = GeomWithData<[f64; 2], String>;

/// secondary indices derived from the primary tables of a [`TableGroup`].
/// indices are never edited in place, they are rebuilt from the tables.
#[derive(Debug, Default)]
pub struct Indices {
    trips_by_route: BTreeSet<CompositeKey>,
    patterns_by_route: BTreeSet<CompositeKey>,
    trips_by_pattern: BTreeSet<CompositeKey>,
    trips_by_calendar: BTreeSet<CompositeKey>,
    patterns_by_stop: BTreeSet<CompositeKey>,
    exceptions_by_calendar: BTreeSet<CompositeKey>,
    trip_count_by_calendar: BTreeMap<String, usize>,
    trip_count_by_pattern_and_calendar: BTreeMap<CompositeKey, usize>,
    exception_count_by_date: BTreeMap<NaiveDate, usize>,
    major_stops: BTreeSet<String>,
    stops_spatial: RTree<StopLocation>,
}

impl Indices {
    pub fn build(group: &TableGroup) -> Indices {
        let mut indices = Indices::default();

        for trip in group.trips().values() {
            let trip_id = trip.id.clone();
            indices
                .trips_by_route
                .insert((trip.route_id.clone(), trip_id.clone()));
            indices
                .trips_by_pattern
                .insert((trip.pattern_id.clone(), trip_id.clone()));
            indices
                .trips_by_calendar
                .insert((trip.calendar_id.clone(), trip_id));
            *indices
                .trip_count_by_calendar
                .entry(trip.calendar_id.clone())
                .or_default() += 1;
            *indices
                .trip_count_by_pattern_and_calendar
                .entry((trip.pattern_id.clone(), trip.calendar_id.clone()))
                .or_default() += 1;
        }

        for pattern in group.trip_patterns().values() {
            indices
                .patterns_by_route
                .insert((pattern.route_id.clone(), pattern.id.clone()));
            for pattern_stop in pattern.pattern_stops.iter() {
                indices
                    .patterns_by_stop
                    .insert((pattern_stop.stop_id.clone(), pattern.id.clone()));
            }
        }

        for exception in group.exceptions().values() {
            for date in exception.dates.iter() {
                *indices.exception_count_by_date.entry(*date).or_default() += 1;
            }
            for calendar_id in exception.referenced_calendars() {
                indices
                    .exceptions_by_calendar
                    .insert((calendar_id.to_string(), exception.id.clone()));
            }
        }

        let locations: Vec<StopLocation> = group
            .stops()
            .values()
            .map(|stop| GeomWithData::new([stop.lon(), stop.lat()], stop.id.clone()))
            .collect();
        indices.stops_spatial = RTree::bulk_load(locations);
        indices.major_stops = group
            .stops()
            .values()
            .filter(|stop| stop.major_stop)
            .map(|stop| stop.id.clone())
            .collect();

        indices
    }

    pub fn trips_by_route(&self, route_id: &str) -> Vec<&str> {
        children(&self.trips_by_route, route_id)
    }

    pub fn patterns_by_route(&self, route_id: &str) -> Vec<&str> {
        children(&self.patterns_by_route, route_id)
    }

    pub fn trips_by_pattern(&self, pattern_id: &str) -> Vec<&str> {
        children(&self.trips_by_pattern, pattern_id)
    }

    pub fn trips_by_calendar(&self, calendar_id: &str) -> Vec<&str> {
        children(&self.trips_by_calendar, calendar_id)
    }

    /// ids of patterns visiting the stop
    pub fn patterns_by_stop(&self, stop_id: &str) -> Vec<&str> {
        children(&self.patterns_by_stop, stop_id)
    }

    /// ids of custom and swap exceptions naming the calendar
    pub fn exceptions_by_calendar(&self, calendar_id: &str) -> Vec<&str> {
        children(&self.exceptions_by_calendar, calendar_id)
    }

    pub fn trip_count_by_calendar(&self, calendar_id: &str) -> usize {
        self.trip_count_by_calendar
            .get(calendar_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn trip_count_by_pattern_and_calendar(&self, pattern_id: &str, calendar_id: &str) -> usize {
        self.trip_count_by_pattern_and_calendar
            .get(&(pattern_id.to_string(), calendar_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// trip counts per calendar for one pattern
    pub fn trip_counts_for_pattern(&self, pattern_id: &str) -> BTreeMap<&str, usize> {
        let start = (pattern_id.to_string(), String::new());
        self.trip_count_by_pattern_and_calendar
            .range(start..)
            .take_while(|((p, _), _)| p == pattern_id)
            .map(|((_, calendar_id), count)| (calendar_id.as_str(), *count))
            .collect()
    }

    pub fn exception_count_by_date(&self, date: &NaiveDate) -> usize {
        self.exception_count_by_date.get(date).copied().unwrap_or(0)
    }

    pub fn major_stops(&self) -> &BTreeSet<String> {
        &self.major_stops
    }

    /// ids of stops within a lon/lat envelope
    pub fn stops_within(&self, envelope: &AABB<[f64; 2]>) -> Vec<&str> {
        self.stops_spatial
            .locate_in_envelope(envelope)
            .map(|location| location.data.as_str())
            .collect()
    }

    /// ids of stops within a bounding box given as west, south, east, north
    pub fn stops_within_bbox(&self, west: f64, south: f64, east: f64, north: f64) -> Vec<&str> {
        self.stops_within(&AABB::from_corners([west, south], [east, north]))
    }
}

/// range scan of all child ids under `parent`.
fn children<'a>(set: &'a BTreeSet<CompositeKey>, parent: &str) -> Vec<&'a str> {
    let start = (parent.to_string(), String::new());
    set.range(start..)
        .take_while(|(p, _)| p == parent)
        .map(|(_, child)| child.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_range_scan() {
        let set: BTreeSet<CompositeKey> = [
            ("r1", "t2"),
            ("r1", "t1"),
            ("r10", "t9"),
            ("r2", "t3"),
        ]
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
        assert_eq!(children(&set, "r1"), vec!["t1", "t2"]);
        assert_eq!(children(&set, "r2"), vec!["t3"]);
        assert!(children(&set, "r3").is_empty());
    }
}
