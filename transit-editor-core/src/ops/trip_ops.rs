use crate::{
    model::Trip,
    store::{StoreError, TableGroup, Transaction},
};

/// checks a trip against the tables: its route, pattern and calendar exist,
/// it has one stop time slot per pattern stop, and each stop time is at the
/// stop of its pattern position.
pub fn validate_trip(tables: &TableGroup, trip: &Trip) -> Result<(), StoreError> {
    tables.routes().try_get(&trip.route_id)?;
    tables.calendars().try_get(&trip.calendar_id)?;
    let pattern = tables.trip_patterns().try_get(&trip.pattern_id)?;
    if pattern.route_id != trip.route_id {
        return Err(StoreError::Validation(format!(
            "trip {} is on route {} but its pattern {} belongs to route {}",
            trip.id, trip.route_id, pattern.id, pattern.route_id
        )));
    }
    if trip.stop_times.len() != pattern.pattern_stops.len() {
        return Err(StoreError::Validation(format!(
            "trip {} has {} stop times but pattern {} has {} stops",
            trip.id,
            trip.stop_times.len(),
            pattern.id,
            pattern.pattern_stops.len()
        )));
    }
    for (i, (slot, pattern_stop)) in trip
        .stop_times
        .iter()
        .zip(pattern.pattern_stops.iter())
        .enumerate()
    {
        if let Some(stop_time) = slot {
            if stop_time.stop_id != pattern_stop.stop_id {
                return Err(StoreError::Validation(format!(
                    "trip {} stop time {i} is at stop {} but pattern {} has stop {}",
                    trip.id, stop_time.stop_id, pattern.id, pattern_stop.stop_id
                )));
            }
        }
    }
    if trip.use_frequency
        && (trip.start_time.is_none() || trip.end_time.is_none() || trip.headway_secs.is_none())
    {
        return Err(StoreError::Validation(format!(
            "frequency trip {} requires a start time, end time and headway",
            trip.id
        )));
    }
    Ok(())
}

/// stores a new trip after validating it.
pub fn create_trip(tx: &mut Transaction, trip: Trip) -> Result<(), StoreError> {
    if tx.trips().contains_key(&trip.id) {
        return Err(StoreError::Conflict(format!("trip {} already exists", trip.id)));
    }
    validate_trip(tx, &trip)?;
    tx.trips_mut().put(trip);
    Ok(())
}

/// validates and stores a new or edited trip.
pub fn put_trip(tx: &mut Transaction, trip: Trip) -> Result<(), StoreError> {
    validate_trip(tx, &trip)?;
    tx.trips_mut().put(trip);
    Ok(())
}
