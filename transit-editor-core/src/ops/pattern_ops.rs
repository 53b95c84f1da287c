use geo::Point;

use super::reconcile::{reconcile_pattern_stops, PatternStopEdit};
use crate::{
    model::{Route, Trip, TripPattern},
    store::{StoreError, TableGroup, Transaction},
};

/// location of every pattern stop, failing if a pattern stop names a missing stop.
pub fn pattern_stop_locations(
    tables: &TableGroup,
    pattern: &TripPattern,
) -> Result<Vec<Point<f64>>, StoreError> {
    pattern
        .pattern_stops
        .iter()
        .enumerate()
        .map(|(i, ps)| {
            tables.stops().get(&ps.stop_id).map(|s| s.location).ok_or_else(|| {
                StoreError::Validation(format!(
                    "pattern {} stop {i} references stop {} which does not exist",
                    pattern.id, ps.stop_id
                ))
            })
        })
        .collect()
}

/// stores a new pattern with computed shape distances.
pub fn create_trip_pattern(
    tx: &mut Transaction,
    mut pattern: TripPattern,
) -> Result<TripPattern, StoreError> {
    if tx.trip_patterns().contains_key(&pattern.id) {
        return Err(StoreError::Conflict(format!(
            "trip pattern {} already exists",
            pattern.id
        )));
    }
    tx.routes().try_get(&pattern.route_id)?;
    let locations = pattern_stop_locations(tx, &pattern)?;
    pattern.calc_shape_dist_traveled(&locations);
    tx.trip_patterns_mut().insert_new(pattern.clone())?;
    Ok(pattern)
}

/// stores an edited pattern and carries a stop sequence change over to its trips.
/// a pattern moved to another route takes its trips along.
///
/// if the pattern switched between frequency and timetable operation, trips of
/// the old kind are deleted first since their times no longer apply.
///
/// # Returns
///
/// * the stored pattern and the edit applied to its trips
pub fn update_trip_pattern(
    tx: &mut Transaction,
    mut edited: TripPattern,
) -> Result<(TripPattern, PatternStopEdit), StoreError> {
    let original = tx.trip_patterns().try_get(&edited.id)?.clone();
    tx.routes().try_get(&edited.route_id)?;
    let locations = pattern_stop_locations(tx, &edited)?;

    if original.use_frequency != edited.use_frequency {
        let stale: Vec<String> = tx
            .trips_for_pattern(&original.id)
            .into_iter()
            .filter(|t| t.use_frequency == original.use_frequency)
            .map(|t| t.id.clone())
            .collect();
        log::info!(
            "pattern {} changed frequency mode, deleting {} trips",
            original.id,
            stale.len()
        );
        for trip_id in stale {
            tx.trips_mut().remove(&trip_id);
        }
    }

    let edit = reconcile_pattern_stops(tx, &original, &edited)?;
    if original.route_id != edited.route_id {
        let moved: Vec<Trip> = tx
            .trips_for_pattern(&edited.id)
            .into_iter()
            .map(|t| Trip {
                route_id: edited.route_id.clone(),
                ..t.clone()
            })
            .collect();
        log::info!(
            "pattern {} moved from route {} to {}, moving {} trips",
            edited.id,
            original.route_id,
            edited.route_id,
            moved.len()
        );
        let trips = tx.trips_mut();
        for trip in moved {
            trips.put(trip);
        }
    }
    edited.calc_shape_dist_traveled(&locations);
    tx.trip_patterns_mut().put(edited.clone());
    Ok((edited, edit))
}

/// deletes a pattern and all of its trips.
pub fn delete_trip_pattern(tx: &mut Transaction, pattern_id: &str) -> Result<TripPattern, StoreError> {
    tx.trip_patterns().try_get(pattern_id)?;
    let trip_ids: Vec<String> = tx
        .indices()
        .trips_by_pattern(pattern_id)
        .into_iter()
        .map(String::from)
        .collect();
    for trip_id in trip_ids.iter() {
        tx.trips_mut().remove(trip_id);
    }
    let removed = tx
        .trip_patterns_mut()
        .remove(pattern_id)
        .ok_or_else(|| StoreError::entity_not_found::<TripPattern>(pattern_id))?;
    log::debug!("deleted pattern {pattern_id} and {} trips", trip_ids.len());
    Ok(removed.as_ref().clone())
}

/// what a route deletion removed
#[derive(Debug, Clone)]
pub struct RouteDeletion {
    pub route: Route,
    pub trips: Vec<Trip>,
    pub patterns: Vec<TripPattern>,
}

/// deletes a route with its trips and patterns. trips go first, so the
/// patterns are empty when removed and need no reconciliation.
pub fn delete_route(tx: &mut Transaction, route_id: &str) -> Result<RouteDeletion, StoreError> {
    tx.routes().try_get(route_id)?;
    let trip_ids: Vec<String> = tx
        .indices()
        .trips_by_route(route_id)
        .into_iter()
        .map(String::from)
        .collect();
    let pattern_ids: Vec<String> = tx
        .indices()
        .patterns_by_route(route_id)
        .into_iter()
        .map(String::from)
        .collect();

    let mut trips = Vec::with_capacity(trip_ids.len());
    for trip_id in trip_ids.iter() {
        if let Some(trip) = tx.trips_mut().remove(trip_id) {
            trips.push(trip.as_ref().clone());
        }
    }
    let mut patterns = Vec::with_capacity(pattern_ids.len());
    for pattern_id in pattern_ids.iter() {
        if let Some(pattern) = tx.trip_patterns_mut().remove(pattern_id) {
            patterns.push(pattern.as_ref().clone());
        }
    }
    let route = tx
        .routes_mut()
        .remove(route_id)
        .ok_or_else(|| StoreError::entity_not_found::<Route>(route_id))?;
    log::info!(
        "deleted route {route_id} with {} trips and {} patterns",
        trips.len(),
        patterns.len()
    );
    Ok(RouteDeletion {
        route: route.as_ref().clone(),
        trips,
        patterns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GtfsRouteType, Stop, StopTime, TripPatternStop};
    use crate::store::VersionedDataStore;

    fn setup() -> VersionedDataStore {
        let store = VersionedDataStore::in_memory();
        let mut tx = store.open_transaction("feed").unwrap();
        for (i, id) in ["A", "B", "C", "X"].iter().enumerate() {
            let mut stop = Stop::new("feed", id, -105.0, 40.0 + 0.01 * i as f64);
            stop.id = id.to_string();
            tx.stops_mut().put(stop);
        }
        let mut route = Route::new("feed", "1", GtfsRouteType::Bus);
        route.id = String::from("r1");
        tx.routes_mut().put(route);
        let mut pattern = TripPattern::new("feed", "r1", "p1");
        pattern.id = String::from("p1");
        pattern.pattern_stops = ["A", "B", "C"].iter().map(|s| TripPatternStop::new(s)).collect();
        let pattern = create_trip_pattern(&mut tx, pattern).unwrap();
        assert!(pattern.pattern_stops[2].shape_dist_traveled.unwrap() > 2000.0);
        for (id, frequency) in [("t1", false), ("t2", true)] {
            let mut trip = Trip::new("feed", "r1", "p1", "c1");
            trip.id = id.to_string();
            trip.use_frequency = frequency;
            trip.stop_times = ["A", "B", "C"]
                .iter()
                .map(|s| Some(StopTime::new(s, None, None)))
                .collect();
            tx.trips_mut().put(trip);
        }
        tx.commit().unwrap();
        store
    }

    #[test]
    fn test_create_requires_existing_stops() {
        let store = setup();
        let mut tx = store.open_transaction("feed").unwrap();
        let mut pattern = TripPattern::new("feed", "r1", "bad");
        pattern.pattern_stops = vec![TripPatternStop::new("A"), TripPatternStop::new("nope")];
        assert!(matches!(
            create_trip_pattern(&mut tx, pattern),
            Err(StoreError::Validation(_))
        ));
        let duplicate = tx.trip_patterns().get_cloned("p1").unwrap();
        assert!(matches!(
            create_trip_pattern(&mut tx, duplicate),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_update_reconciles_trips() {
        let store = setup();
        let mut tx = store.open_transaction("feed").unwrap();
        let mut edited = tx.trip_patterns().get_cloned("p1").unwrap();
        edited.pattern_stops.insert(1, TripPatternStop::new("X"));
        let (stored, edit) = update_trip_pattern(&mut tx, edited).unwrap();
        assert_eq!(edit, PatternStopEdit::Insert { index: 1 });
        assert_eq!(stored.pattern_stops.len(), 4);
        for trip in tx.trips_for_pattern("p1") {
            assert_eq!(trip.stop_times.len(), 4);
            assert!(trip.stop_times[1].is_none());
        }
    }

    #[test]
    fn test_update_moves_trips_with_pattern_route() {
        let store = setup();
        let mut tx = store.open_transaction("feed").unwrap();
        let mut route = Route::new("feed", "2", GtfsRouteType::Bus);
        route.id = String::from("r2");
        tx.routes_mut().put(route);
        let mut edited = tx.trip_patterns().get_cloned("p1").unwrap();
        edited.route_id = String::from("r2");
        let (stored, _) = update_trip_pattern(&mut tx, edited).unwrap();
        assert_eq!(stored.route_id, "r2");
        tx.commit().unwrap();

        let tx = store.open_read_transaction("feed").unwrap();
        assert_eq!(tx.trips().get("t1").unwrap().route_id, "r2");
        assert_eq!(tx.trips().get("t2").unwrap().route_id, "r2");
        assert_eq!(tx.indices().trips_by_route("r2"), vec!["t1", "t2"]);
        assert!(tx.indices().trips_by_route("r1").is_empty());
        assert_eq!(tx.indices().patterns_by_route("r2"), vec!["p1"]);
    }

    #[test]
    fn test_update_frequency_switch_drops_old_trips() {
        let store = setup();
        let mut tx = store.open_transaction("feed").unwrap();
        let mut edited = tx.trip_patterns().get_cloned("p1").unwrap();
        edited.use_frequency = true;
        update_trip_pattern(&mut tx, edited).unwrap();
        assert!(!tx.trips().contains_key("t1"));
        assert!(tx.trips().contains_key("t2"));
    }

    #[test]
    fn test_failed_update_rolls_back() {
        let store = setup();
        {
            let mut tx = store.open_transaction("feed").unwrap();
            let mut edited = tx.trip_patterns().get_cloned("p1").unwrap();
            edited.use_frequency = true;
            edited.pattern_stops.swap(1, 2);
            assert!(update_trip_pattern(&mut tx, edited).is_err());
        }
        let tx = store.open_read_transaction("feed").unwrap();
        assert!(tx.trips().contains_key("t1"));
        assert_eq!(tx.trip_patterns().get("p1").unwrap().stop_ids(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_delete_route_cascades() {
        let store = setup();
        let mut tx = store.open_transaction("feed").unwrap();
        let deletion = delete_route(&mut tx, "r1").unwrap();
        assert_eq!(deletion.trips.len(), 2);
        assert_eq!(deletion.patterns.len(), 1);
        tx.commit().unwrap();
        let tx = store.open_read_transaction("feed").unwrap();
        assert!(tx.trips().is_empty());
        assert!(tx.trip_patterns().is_empty());
        assert!(tx.routes().is_empty());
        assert!(tx.indices().trips_by_route("r1").is_empty());
    }

    #[test]
    fn test_delete_pattern_removes_trips() {
        let store = setup();
        let mut tx = store.open_transaction("feed").unwrap();
        delete_trip_pattern(&mut tx, "p1").unwrap();
        assert!(tx.trips().is_empty());
        assert!(matches!(
            delete_trip_pattern(&mut tx, "p1"),
            Err(StoreError::EntityNotFound { .. })
        ));
    }
}
