use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    model::{Stop, Trip, TripPattern},
    store::{StoreError, Transaction},
};

/// what a call to [`merge_stops`] changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub target_stop_id: String,
    pub merged_stop_ids: Vec<String>,
    pub patterns_updated: usize,
    pub trips_updated: usize,
}

/// merges stops into the first stop of `stop_ids`. every pattern stop and stop
/// time at one of the other stops is pointed at the first stop, keeping its
/// position, and the other stops are deleted.
pub fn merge_stops(tx: &mut Transaction, stop_ids: &[String]) -> Result<MergeSummary, StoreError> {
    let (target_id, source_ids) = stop_ids.split_first().ok_or_else(|| {
        StoreError::Validation(String::from("at least two stops are required to merge"))
    })?;
    if source_ids.is_empty() {
        return Err(StoreError::Validation(String::from(
            "at least two stops are required to merge",
        )));
    }
    let unique: BTreeSet<&String> = stop_ids.iter().collect();
    if unique.len() != stop_ids.len() {
        return Err(StoreError::Validation(format!(
            "stop ids to merge must be distinct: [{}]",
            stop_ids.join(", ")
        )));
    }
    for stop_id in stop_ids.iter() {
        tx.stops().try_get(stop_id)?;
    }

    // gather every rewrite before the first write, so the indices are built once
    let sources: BTreeSet<&str> = source_ids.iter().map(String::as_str).collect();
    let mut patterns: BTreeMap<String, TripPattern> = BTreeMap::new();
    for source_id in sources.iter() {
        for pattern in tx.patterns_for_stop(source_id) {
            patterns
                .entry(pattern.id.clone())
                .or_insert_with(|| pattern.clone());
        }
    }
    let mut trips: Vec<Trip> = vec![];
    for pattern in patterns.values_mut() {
        for pattern_stop in pattern.pattern_stops.iter_mut() {
            if sources.contains(pattern_stop.stop_id.as_str()) {
                pattern_stop.stop_id = target_id.clone();
            }
        }
        for trip in tx.trips_for_pattern(&pattern.id) {
            let mut trip = trip.clone();
            if rewrite_stop_times(&mut trip, &sources, target_id) {
                trips.push(trip);
            }
        }
    }

    let summary = MergeSummary {
        target_stop_id: target_id.clone(),
        merged_stop_ids: source_ids.to_vec(),
        patterns_updated: patterns.len(),
        trips_updated: trips.len(),
    };
    let trip_table = tx.trips_mut();
    for trip in trips {
        trip_table.put(trip);
    }
    let pattern_table = tx.trip_patterns_mut();
    for pattern in patterns.into_values() {
        pattern_table.put(pattern);
    }

    for source_id in source_ids.iter() {
        if let Some(pattern) = tx.trip_patterns().values().find(|p| p.references_stop(source_id)) {
            return Err(StoreError::ConsistencyViolation(format!(
                "pattern {} still references stop {source_id} after merging it into {target_id}",
                pattern.id
            )));
        }
        if let Some(trip) = tx.trips().values().find(|t| t.references_stop(source_id)) {
            return Err(StoreError::ConsistencyViolation(format!(
                "trip {} still references stop {source_id} after merging it into {target_id}",
                trip.id
            )));
        }
    }
    let stop_table = tx.stops_mut();
    for source_id in source_ids.iter() {
        stop_table.remove(source_id);
    }
    log::info!(
        "merged stops [{}] into {target_id}, updating {} patterns and {} trips",
        summary.merged_stop_ids.join(", "),
        summary.patterns_updated,
        summary.trips_updated
    );
    Ok(summary)
}

fn rewrite_stop_times(trip: &mut Trip, sources: &BTreeSet<&str>, target_id: &str) -> bool {
    let mut changed = false;
    for stop_time in trip.stop_times.iter_mut().flatten() {
        if sources.contains(stop_time.stop_id.as_str()) {
            stop_time.stop_id = target_id.to_string();
            changed = true;
        }
    }
    changed
}

/// deletes a stop that no pattern visits.
pub fn delete_stop(tx: &mut Transaction, stop_id: &str) -> Result<Stop, StoreError> {
    tx.stops().try_get(stop_id)?;
    let patterns = tx.indices().patterns_by_stop(stop_id);
    if !patterns.is_empty() {
        return Err(StoreError::Conflict(format!(
            "stop {stop_id} is used by {} trip patterns and cannot be deleted",
            patterns.len()
        )));
    }
    let removed = tx
        .stops_mut()
        .remove(stop_id)
        .ok_or_else(|| StoreError::entity_not_found::<Stop>(stop_id))?;
    Ok(removed.as_ref().clone())
}

/// stops that are within `tolerance_meters` of an earlier stop, grouped with it.
/// each group is ordered with the earliest stop id first, ready for [`merge_stops`].
pub fn find_duplicate_stops(tx: &Transaction, tolerance_meters: f64) -> Vec<Vec<String>> {
    let mut assigned: BTreeSet<&str> = BTreeSet::new();
    let mut groups = vec![];
    for stop in tx.stops().values() {
        if assigned.contains(stop.id.as_str()) {
            continue;
        }
        let envelope = crate::util::geo_utils::envelope_around(stop.location, tolerance_meters);
        let mut group: Vec<&Stop> = tx
            .indices()
            .stops_within(&envelope)
            .into_iter()
            .filter(|id| *id != stop.id && !assigned.contains(id))
            .filter_map(|id| tx.stops().get(id))
            .filter(|other| {
                crate::util::geo_utils::haversine_meters(stop.location, other.location)
                    <= tolerance_meters
            })
            .collect();
        if group.is_empty() {
            continue;
        }
        group.sort_by(|a, b| a.id.cmp(&b.id));
        assigned.insert(stop.id.as_str());
        let mut ids = vec![stop.id.clone()];
        for other in group {
            assigned.insert(other.id.as_str());
            ids.push(other.id.clone());
        }
        groups.push(ids);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StopTime, TripPatternStop};
    use crate::store::VersionedDataStore;

    fn stop(id: &str, lon: f64, lat: f64) -> Stop {
        let mut stop = Stop::new("feed", id, lon, lat);
        stop.id = id.to_string();
        stop
    }

    fn setup() -> VersionedDataStore {
        let store = VersionedDataStore::in_memory();
        let mut tx = store.open_transaction("feed").unwrap();
        for (id, lon) in [("S1", 0.0), ("S2", 0.0001), ("S3", 0.0002), ("S4", 0.1)] {
            tx.stops_mut().put(stop(id, lon, 0.0));
        }
        let mut p1 = TripPattern::new("feed", "r", "p1");
        p1.id = String::from("p1");
        p1.pattern_stops = ["S4", "S2", "S3"].iter().map(|s| TripPatternStop::new(s)).collect();
        let mut p2 = TripPattern::new("feed", "r", "p2");
        p2.id = String::from("p2");
        p2.pattern_stops = ["S3", "S4"].iter().map(|s| TripPatternStop::new(s)).collect();
        tx.trip_patterns_mut().put(p1);
        tx.trip_patterns_mut().put(p2);

        let mut t1 = Trip::new("feed", "r", "p1", "c");
        t1.id = String::from("t1");
        t1.stop_times = vec![
            Some(StopTime::new("S4", Some(0), Some(0))),
            None,
            Some(StopTime::new("S3", Some(120), Some(120))),
        ];
        let mut t2 = Trip::new("feed", "r", "p2", "c");
        t2.id = String::from("t2");
        t2.stop_times = vec![
            Some(StopTime::new("S3", Some(0), Some(0))),
            Some(StopTime::new("S4", Some(60), Some(60))),
        ];
        tx.trips_mut().put(t1);
        tx.trips_mut().put(t2);
        tx.commit().unwrap();
        store
    }

    #[test]
    fn test_merge_rewrites_references_in_place() {
        let store = setup();
        let mut tx = store.open_transaction("feed").unwrap();
        let ids = vec![String::from("S1"), String::from("S2"), String::from("S3")];
        let summary = merge_stops(&mut tx, &ids).unwrap();
        tx.commit().unwrap();
        assert_eq!(summary.merged_stop_ids, vec!["S2", "S3"]);
        // p1 visits both merged stops and counts once
        assert_eq!(summary.patterns_updated, 2);
        assert_eq!(summary.trips_updated, 2);

        let tx = store.open_read_transaction("feed").unwrap();
        assert!(!tx.stops().contains_key("S2"));
        assert!(!tx.stops().contains_key("S3"));
        assert_eq!(tx.trip_patterns().get("p1").unwrap().stop_ids(), vec!["S4", "S1", "S1"]);
        assert_eq!(tx.trip_patterns().get("p2").unwrap().stop_ids(), vec!["S1", "S4"]);
        let t1 = tx.trips().get("t1").unwrap();
        assert!(t1.stop_times[1].is_none());
        assert_eq!(t1.stop_times[2].as_ref().unwrap().stop_id, "S1");
        assert_eq!(tx.trips().get("t2").unwrap().stop_times[0].as_ref().unwrap().stop_id, "S1");
        for id in ["S2", "S3"] {
            assert!(tx.patterns_for_stop(id).is_empty());
            assert!(!tx.trips().values().any(|t| t.references_stop(id)));
        }
    }

    #[test]
    fn test_merge_requires_existing_stops() {
        let store = setup();
        let mut tx = store.open_transaction("feed").unwrap();
        let ids = vec![String::from("S1"), String::from("missing")];
        assert!(matches!(
            merge_stops(&mut tx, &ids),
            Err(StoreError::EntityNotFound { .. })
        ));
        assert!(merge_stops(&mut tx, &[String::from("S1")]).is_err());
        let dup = vec![String::from("S1"), String::from("S1")];
        assert!(matches!(merge_stops(&mut tx, &dup), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_delete_stop_in_use() {
        let store = setup();
        let mut tx = store.open_transaction("feed").unwrap();
        assert!(matches!(delete_stop(&mut tx, "S3"), Err(StoreError::Conflict(_))));
        let removed = delete_stop(&mut tx, "S1").unwrap();
        assert_eq!(removed.id, "S1");
        assert!(!tx.stops().contains_key("S1"));
    }

    #[test]
    fn test_find_duplicate_stops() {
        let store = setup();
        let tx = store.open_read_transaction("feed").unwrap();
        // S1, S2 and S3 are about 11 meters apart in a row
        let groups = find_duplicate_stops(&tx, 15.0);
        assert_eq!(groups, vec![vec!["S1", "S2"]]);
        let groups = find_duplicate_stops(&tx, 30.0);
        assert_eq!(groups, vec![vec!["S1", "S2", "S3"]]);
        assert!(find_duplicate_stops(&tx, 1.0).is_empty());
    }
}
