use std::collections::{BTreeMap, HashMap, HashSet};

use geo::Point;
use itertools::Itertools;
use transit_editor_core::{
    model::{
        new_id, Agency, AttributeAvailability, EditorFeed, Fare, FareRule, GtfsRouteType,
        LocationType, PickupDropOffType, Route, RouteType, Stop, StopTime, Trip, TripDirection,
    },
    store::{GlobalTables, GlobalTransaction, Transaction, VersionedDataStore},
    util::geo_utils,
};

use super::{
    calendar_inference::{calendar_from_record, infer_calendar, swap_exceptions},
    pattern_builder::{build_pattern, PatternKey, PatternSource},
    ImportOptions, ImportSummary,
};
use crate::{
    feed::{CalendarDateRecord, FeedTables, FrequencyRecord},
    gtfs_error::GtfsError,
    job::{CancelFlag, ProgressReporter},
};

/// replaces the contents of a feed with a GTFS feed and takes a snapshot of the result.
///
/// the feed's tables are wiped and rebuilt inside one transaction, so a failed
/// or cancelled import leaves the previously committed feed untouched. route
/// types and the feed record are written to the global tables in a short
/// transaction once the feed is built, so imports into other feeds do not wait.
///
/// # Arguments
///
/// * `store` - destination store
/// * `feed_id` - feed to replace
/// * `tables` - canonical GTFS tables, see [`crate::feed::read_canonical_feed`]
/// * `options` - route status and snapshot naming
/// * `reporter` - receives progress updates
/// * `cancel` - checked between stages until the import commits
///
/// # Returns
///
/// counts of the imported entities and the version of the new current snapshot
pub fn import_feed(
    store: &VersionedDataStore,
    feed_id: &str,
    tables: &FeedTables,
    options: &ImportOptions,
    reporter: &ProgressReporter,
    cancel: &CancelFlag,
) -> Result<ImportSummary, GtfsError> {
    log::info!("importing GTFS into feed {feed_id}");
    run_import(store, feed_id, tables, options, reporter, cancel).inspect_err(|e| {
        log::error!("failed to import GTFS into feed {feed_id}: {e}");
        reporter.fail(&format!("Failed to process GTFS feed: {e}"));
    })
}

fn run_import(
    store: &VersionedDataStore,
    feed_id: &str,
    tables: &FeedTables,
    options: &ImportOptions,
    reporter: &ProgressReporter,
    cancel: &CancelFlag,
) -> Result<ImportSummary, GtfsError> {
    let mut summary = ImportSummary {
        feed_id: feed_id.to_string(),
        ..Default::default()
    };

    reporter.report(2.0, "Wiping old data...");
    let mut tx = store.open_transaction(feed_id)?;
    tx.clear();
    cancel.check()?;

    reporter.report(8.0, "Beginning feed import...");
    let mut route_types = RouteTypeIds::new(&*store.global_tables()?);
    let agency_ids = import_agencies(&mut tx, feed_id, tables, &mut summary);
    reporter.report(10.0, &format!("Agencies loaded: {}", summary.agencies));

    reporter.report(15.0, "Importing stops...");
    let stops = import_stops(&mut tx, feed_id, tables, &mut summary)?;
    let locations = stops.values().map(|s| s.location).collect_vec();
    let center = geo_utils::bounding_box_center(&locations);
    reporter.report(25.0, &format!("Stops loaded: {}", summary.stops));
    cancel.check()?;

    reporter.report(30.0, "Importing routes...");
    let route_ids = import_routes(
        &mut tx,
        &mut route_types,
        feed_id,
        tables,
        &agency_ids,
        options,
        &mut summary,
    );
    reporter.report(35.0, &format!("Routes loaded: {}", summary.routes));

    reporter.report(38.0, "Importing service calendars...");
    let calendar_ids = import_calendars(&mut tx, feed_id, tables, options, &mut summary);
    reporter.report(
        45.0,
        &format!("Service calendars loaded: {}", summary.calendars),
    );
    cancel.check()?;

    reporter.report(50.0, "Importing trips...");
    let lookups = TripLookups {
        stops: &stops,
        route_ids: &route_ids,
        calendar_ids: &calendar_ids,
    };
    import_trips(&mut tx, feed_id, tables, &lookups, reporter, cancel, &mut summary)?;
    reporter.report(90.0, &format!("Trips loaded: {}", summary.trips));

    import_fares(&mut tx, feed_id, tables, &agency_ids, &mut summary);
    reporter.report(92.0, &format!("Fares loaded: {}", summary.fares));

    reporter.report(95.0, "Saving snapshot...");
    cancel.check()?;
    let mut gtx = store.open_global_transaction()?;
    register_route_types(&mut tx, &mut gtx, route_types.added, &mut summary);
    let feed = feed_record(&gtx, feed_id, tables, center);
    gtx.feeds_mut().put(feed);
    // feed first: a failure committing the global tables leaves unreferenced
    // route types rather than routes with missing types
    tx.commit()?;
    gtx.commit()?;
    let snapshot = store.snapshot_manager().take_snapshot(
        feed_id,
        options.source_version_ref.as_deref(),
        &options.snapshot_name(feed_id),
        None,
        true,
    )?;
    summary.snapshot_version = snapshot.version;

    log::info!(
        "imported GTFS feed {feed_id}: {} agencies; {} routes; {} stops; {} stop times; {} trips; {} patterns",
        summary.agencies,
        summary.routes,
        summary.stops,
        summary.stop_times,
        summary.trips,
        summary.trip_patterns
    );
    reporter.report(100.0, "Import complete!");
    Ok(summary)
}

/// global route type ids by GTFS route_type. types first seen in this import
/// are held back until the global tables are written.
struct RouteTypeIds {
    ids: HashMap<GtfsRouteType, String>,
    added: Vec<RouteType>,
}

impl RouteTypeIds {
    fn new(global: &GlobalTables) -> RouteTypeIds {
        let ids = global
            .route_types()
            .values()
            .map(|rt| (rt.gtfs_route_type, rt.id.clone()))
            .collect();
        RouteTypeIds { ids, added: vec![] }
    }

    fn id_for(&mut self, gtfs_route_type: GtfsRouteType) -> String {
        self.ids
            .entry(gtfs_route_type)
            .or_insert_with(|| {
                let route_type = RouteType::new(gtfs_route_type);
                let id = route_type.id.clone();
                self.added.push(route_type);
                id
            })
            .clone()
    }
}

/// writes the route types this import added. a type another writer registered
/// since the import began is reused, and the feed's routes are pointed at it.
fn register_route_types(
    tx: &mut Transaction,
    gtx: &mut GlobalTransaction,
    added: Vec<RouteType>,
    summary: &mut ImportSummary,
) {
    for route_type in added {
        let existing = gtx
            .route_type_for(route_type.gtfs_route_type)
            .map(|rt| rt.id.clone());
        match existing {
            Some(existing) => {
                let routes = tx
                    .routes()
                    .values()
                    .filter(|r| r.route_type_id.as_deref() == Some(route_type.id.as_str()))
                    .map(|r| Route {
                        route_type_id: Some(existing.clone()),
                        ..r.clone()
                    })
                    .collect_vec();
                let table = tx.routes_mut();
                for route in routes {
                    table.put(route);
                }
            }
            None => {
                gtx.route_types_mut().put(route_type);
                summary.route_types += 1;
            }
        }
    }
}

/// the global feed record, with feed_info and the stop center applied.
fn feed_record(
    global: &GlobalTables,
    feed_id: &str,
    tables: &FeedTables,
    center: Option<Point<f64>>,
) -> EditorFeed {
    let mut feed = global
        .feeds()
        .get_cloned(feed_id)
        .unwrap_or_else(|| EditorFeed::new(feed_id));
    if let Some(info) = tables.feed_info.first() {
        feed.feed_publisher_name = info.feed_publisher_name.clone();
        feed.feed_publisher_url = info.feed_publisher_url.clone();
        feed.feed_lang = info.feed_lang.clone();
        feed.feed_start_date = info.feed_start_date;
        feed.feed_end_date = info.feed_end_date;
        feed.feed_version = info.feed_version.clone();
    }
    if let Some(center) = center {
        feed.default_lat = Some(center.y());
        feed.default_lon = Some(center.x());
    }
    feed
}

/// internal agency id by GTFS agency_id. a missing agency_id is keyed by "".
fn import_agencies(
    tx: &mut Transaction,
    feed_id: &str,
    tables: &FeedTables,
    summary: &mut ImportSummary,
) -> HashMap<String, String> {
    let mut agency_ids = HashMap::new();
    for record in tables.agencies.iter() {
        let agency = Agency {
            id: new_id(),
            feed_id: feed_id.to_string(),
            gtfs_agency_id: record.agency_id.clone(),
            name: record.agency_name.clone(),
            url: Some(record.agency_url.clone()).filter(|u| !u.is_empty()),
            timezone: record.agency_timezone.clone(),
            lang: record.agency_lang.clone(),
            phone: record.agency_phone.clone(),
            fare_url: record.agency_fare_url.clone(),
            email: record.agency_email.clone(),
        };
        agency_ids.insert(record.agency_id.clone().unwrap_or_default(), agency.id.clone());
        tx.agencies_mut().put(agency);
        summary.agencies += 1;
    }
    agency_ids
}

/// imported stops by GTFS stop_id. stops without coordinates, such as station
/// entrances, take the location of their parent station.
fn import_stops(
    tx: &mut Transaction,
    feed_id: &str,
    tables: &FeedTables,
    summary: &mut ImportSummary,
) -> Result<HashMap<String, Stop>, GtfsError> {
    let coordinates: HashMap<&str, Point<f64>> = tables
        .stops
        .iter()
        .filter_map(|s| match (s.stop_lon, s.stop_lat) {
            (Some(lon), Some(lat)) => Some((s.stop_id.as_str(), Point::new(lon, lat))),
            _ => None,
        })
        .collect();

    let mut stops: HashMap<String, Stop> = HashMap::new();
    for record in tables.stops.iter() {
        let location = coordinates
            .get(record.stop_id.as_str())
            .or_else(|| {
                record
                    .parent_station
                    .as_deref()
                    .and_then(|parent| coordinates.get(parent))
            })
            .copied()
            .ok_or_else(|| {
                GtfsError::InvalidData(format!(
                    "stop {} has no location and no parent station with a location",
                    record.stop_id
                ))
            })?;
        let name = record.stop_name.clone().unwrap_or_default();
        let mut stop = Stop::new(feed_id, &name, location.x(), location.y());
        stop.gtfs_stop_id = Some(record.stop_id.clone());
        stop.stop_code = record.stop_code.clone();
        stop.stop_desc = record.stop_desc.clone();
        stop.zone_id = record.zone_id.clone();
        stop.stop_url = record.stop_url.clone();
        stop.location_type = LocationType::from_gtfs(record.location_type);
        stop.stop_timezone = record.stop_timezone.clone();
        stop.wheelchair_boarding = AttributeAvailability::from_gtfs(record.wheelchair_boarding);
        if stops.insert(record.stop_id.clone(), stop).is_some() {
            return Err(GtfsError::InvalidData(format!(
                "stop_id {} appears more than once",
                record.stop_id
            )));
        }
    }

    // parent stations are stored as internal ids
    for record in tables.stops.iter() {
        let Some(parent) = record.parent_station.as_deref().filter(|p| !p.is_empty()) else {
            continue;
        };
        let parent_id = match stops.get(parent) {
            Some(parent_stop) => parent_stop.id.clone(),
            None => {
                log::warn!(
                    "stop {} references unknown parent station {parent}",
                    record.stop_id
                );
                continue;
            }
        };
        if let Some(stop) = stops.get_mut(&record.stop_id) {
            stop.parent_station = Some(parent_id);
        }
    }

    for stop in stops.values() {
        tx.stops_mut().put(stop.clone());
    }
    summary.stops = stops.len();
    Ok(stops)
}

/// internal route id by GTFS route_id. GTFS route_types without a global
/// route type get a new one in `route_types`.
fn import_routes(
    tx: &mut Transaction,
    route_types: &mut RouteTypeIds,
    feed_id: &str,
    tables: &FeedTables,
    agency_ids: &HashMap<String, String>,
    options: &ImportOptions,
    summary: &mut ImportSummary,
) -> HashMap<String, String> {
    let single_agency = match agency_ids.values().collect_vec().as_slice() {
        [only] => Some((*only).clone()),
        _ => None,
    };
    let mut route_ids = HashMap::new();
    for record in tables.routes.iter() {
        let gtfs_route_type = GtfsRouteType::from_gtfs(record.route_type);
        let route_type_id = route_types.id_for(gtfs_route_type);

        let agency_id = match record.agency_id.as_deref() {
            Some(gtfs_agency_id) => agency_ids.get(gtfs_agency_id).cloned(),
            None => agency_ids.get("").cloned().or_else(|| single_agency.clone()),
        };
        if agency_id.is_none() {
            log::warn!(
                "route {} references agency {:?} which is not in the feed",
                record.route_id,
                record.agency_id
            );
        }

        let mut route = Route::new(
            feed_id,
            record.route_short_name.as_deref().unwrap_or_default(),
            gtfs_route_type,
        );
        route.route_short_name = record.route_short_name.clone();
        route.gtfs_route_id = Some(record.route_id.clone());
        route.route_long_name = record.route_long_name.clone();
        route.route_desc = record.route_desc.clone();
        route.route_type_id = Some(route_type_id);
        route.route_url = record.route_url.clone();
        route.route_color = record.route_color.clone();
        route.route_text_color = record.route_text_color.clone();
        route.route_branding_url = record.route_branding_url.clone();
        route.status = options.route_status;
        route.agency_id = agency_id;

        route_ids.insert(record.route_id.clone(), route.id.clone());
        tx.routes_mut().put(route);
        summary.routes += 1;
    }
    route_ids
}

/// internal calendar id by GTFS service_id. calendar.txt rows are copied and
/// their calendar_dates become swap exceptions; services found only in
/// calendar_dates.txt get an inferred calendar.
fn import_calendars(
    tx: &mut Transaction,
    feed_id: &str,
    tables: &FeedTables,
    options: &ImportOptions,
    summary: &mut ImportSummary,
) -> HashMap<String, String> {
    let mut explicit_ids: HashMap<String, String> = HashMap::new();
    for record in tables.calendars.iter() {
        if explicit_ids.contains_key(&record.service_id) {
            log::warn!(
                "service {} appears more than once in calendar.txt, keeping the first row",
                record.service_id
            );
            continue;
        }
        let calendar = calendar_from_record(feed_id, record);
        explicit_ids.insert(record.service_id.clone(), calendar.id.clone());
        tx.calendars_mut().put(calendar);
        summary.calendars += 1;
    }

    let mut calendar_ids = explicit_ids.clone();
    let dates_by_service: BTreeMap<&str, Vec<&CalendarDateRecord>> = tables
        .calendar_dates
        .iter()
        .into_group_map_by(|cd| cd.service_id.as_str())
        .into_iter()
        .collect();
    for (service_id, dates) in dates_by_service {
        if calendar_ids.contains_key(service_id) {
            continue;
        }
        let calendar = infer_calendar(feed_id, service_id, &dates, options.reference_date);
        calendar_ids.insert(service_id.to_string(), calendar.id.clone());
        tx.calendars_mut().put(calendar);
        summary.calendars += 1;
        summary.inferred_calendars += 1;
    }

    for exception in swap_exceptions(feed_id, &tables.calendar_dates, &explicit_ids) {
        tx.exceptions_mut().put(exception);
        summary.exceptions += 1;
    }
    calendar_ids
}

struct TripLookups<'a> {
    stops: &'a HashMap<String, Stop>,
    route_ids: &'a HashMap<String, String>,
    calendar_ids: &'a HashMap<String, String>,
}

/// imports trips with their stop times and frequencies, creating patterns as new
/// stop sequences are found.
fn import_trips(
    tx: &mut Transaction,
    feed_id: &str,
    tables: &FeedTables,
    lookups: &TripLookups,
    reporter: &ProgressReporter,
    cancel: &CancelFlag,
    summary: &mut ImportSummary,
) -> Result<(), GtfsError> {
    let stop_times_by_trip = tables.stop_times_by_trip()?;
    let shapes = tables.shape_lines();
    let mut frequencies: HashMap<&str, &FrequencyRecord> = HashMap::new();
    for frequency in tables.frequencies.iter() {
        if frequencies.contains_key(frequency.trip_id.as_str()) {
            log::warn!(
                "trip {} has more than one frequency period, keeping the first",
                frequency.trip_id
            );
            continue;
        }
        frequencies.insert(frequency.trip_id.as_str(), frequency);
    }

    let mut patterns: HashMap<PatternKey, String> = HashMap::new();
    let mut processed: HashSet<&str> = HashSet::new();
    let total = tables.trips.len().max(1);
    for (idx, record) in tables.trips.iter().enumerate() {
        if idx % 1000 == 0 {
            cancel.check()?;
            reporter.report(
                50.0 + 40.0 * idx as f64 / total as f64,
                &format!("Importing trips... {idx}/{total}"),
            );
        }
        if !processed.insert(record.trip_id.as_str()) {
            log::warn!("trip {} appears more than once, skipping", record.trip_id);
            continue;
        }
        let route_id = lookups.route_ids.get(&record.route_id).ok_or_else(|| {
            GtfsError::InvalidData(format!(
                "trip {} references unknown route {}",
                record.trip_id, record.route_id
            ))
        })?;
        let calendar_id = lookups.calendar_ids.get(&record.service_id).ok_or_else(|| {
            GtfsError::InvalidData(format!(
                "trip {} references unknown service {}",
                record.trip_id, record.service_id
            ))
        })?;
        let Some(stop_times) = stop_times_by_trip.get(record.trip_id.as_str()) else {
            log::warn!("trip {} has no stop times, skipping", record.trip_id);
            continue;
        };
        let stops = stop_times
            .iter()
            .map(|st| {
                lookups.stops.get(&st.stop_id).ok_or_else(|| {
                    GtfsError::InvalidData(format!(
                        "trip {} visits unknown stop {}",
                        record.trip_id, st.stop_id
                    ))
                })
            })
            .collect::<Result<Vec<&Stop>, GtfsError>>()?;
        let frequency = frequencies.get(record.trip_id.as_str()).copied();

        let key = PatternKey {
            route_id: route_id.clone(),
            use_frequency: frequency.is_some(),
            stop_ids: stops.iter().map(|s| s.id.clone()).collect(),
        };
        let pattern_id = if let Some(pattern_id) = patterns.get(&key).cloned() {
            pattern_id
        } else {
            let shape = match record.shape_id.as_deref().filter(|s| !s.is_empty()) {
                Some(shape_id) => {
                    let shape = shapes.get(shape_id).cloned();
                    if shape.is_none() {
                        log::warn!("trip {} references unknown shape {shape_id}", record.trip_id);
                    }
                    shape
                }
                None => None,
            };
            let locations = stops.iter().map(|s| s.location).collect_vec();
            let source = PatternSource {
                trip: record,
                stop_times,
                stop_ids: &key.stop_ids,
                locations: &locations,
                last_stop_name: stops.last().map(|s| s.stop_name.as_str()).unwrap_or_default(),
                shape,
            };
            let pattern = build_pattern(feed_id, &key, source);
            let pattern_id = pattern.id.clone();
            tx.trip_patterns_mut().put(pattern);
            patterns.insert(key, pattern_id.clone());
            pattern_id
        };

        let mut trip = Trip::new(feed_id, route_id, &pattern_id, calendar_id);
        trip.gtfs_trip_id = Some(record.trip_id.clone());
        trip.trip_headsign = record.trip_headsign.clone();
        trip.trip_short_name = record.trip_short_name.clone();
        trip.block_id = record.block_id.clone();
        trip.trip_direction = TripDirection::from_gtfs(record.direction_id);
        trip.wheelchair_boarding = AttributeAvailability::from_gtfs(record.wheelchair_accessible);
        if let Some(frequency) = frequency {
            trip.use_frequency = true;
            trip.start_time = Some(frequency.start_time);
            trip.end_time = Some(frequency.end_time);
            trip.headway_secs = Some(frequency.headway_secs);
            summary.frequency_trips += 1;
        }
        trip.stop_times = stop_times
            .iter()
            .zip(stops.iter())
            .map(|(st, stop)| {
                Some(StopTime {
                    stop_id: stop.id.clone(),
                    arrival_time: st.arrival_time,
                    departure_time: st.departure_time,
                    pickup_type: st.pickup_type.and_then(PickupDropOffType::from_gtfs),
                    drop_off_type: st.drop_off_type.and_then(PickupDropOffType::from_gtfs),
                    stop_headsign: st.stop_headsign.clone(),
                })
            })
            .collect();
        summary.stop_times += trip.stop_times.len();
        summary.trips += 1;
        tx.trips_mut().put(trip);

        if summary.trips % 1000 == 0 {
            log::info!("loaded {} / {} trips", summary.trips, tables.trips.len());
        }
    }
    summary.trip_patterns = patterns.len();
    Ok(())
}

fn import_fares(
    tx: &mut Transaction,
    feed_id: &str,
    tables: &FeedTables,
    agency_ids: &HashMap<String, String>,
    summary: &mut ImportSummary,
) {
    let mut rules_by_fare: HashMap<&str, Vec<FareRule>> = HashMap::new();
    for rule in tables.fare_rules.iter() {
        rules_by_fare
            .entry(rule.fare_id.as_str())
            .or_default()
            .push(FareRule {
                route_id: rule.route_id.clone(),
                origin_id: rule.origin_id.clone(),
                destination_id: rule.destination_id.clone(),
                contains_id: rule.contains_id.clone(),
            });
    }
    for record in tables.fare_attributes.iter() {
        let fare = Fare {
            id: new_id(),
            feed_id: feed_id.to_string(),
            gtfs_fare_id: record.fare_id.clone(),
            description: None,
            price: record.price,
            currency_type: record.currency_type.clone(),
            payment_method: record.payment_method,
            transfers: record.transfers,
            transfer_duration: record.transfer_duration,
            agency_id: record
                .agency_id
                .as_deref()
                .and_then(|id| agency_ids.get(id))
                .cloned(),
            fare_rules: rules_by_fare
                .remove(record.fare_id.as_str())
                .unwrap_or_default(),
        };
        tx.fares_mut().put(fare);
        summary.fares += 1;
    }
    for fare_id in rules_by_fare.keys() {
        log::warn!("fare rules reference unknown fare {fare_id}, ignoring them");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_feed::{sample_feed, ymd};
    use transit_editor_core::model::{ExemplarService, StatusType};

    fn options() -> ImportOptions {
        ImportOptions {
            reference_date: ymd(2024, 6, 1),
            ..Default::default()
        }
    }

    fn import(store: &VersionedDataStore, tables: &FeedTables) -> Result<ImportSummary, GtfsError> {
        import_feed(
            store,
            "metro",
            tables,
            &options(),
            &ProgressReporter::silent(),
            &CancelFlag::new(),
        )
    }

    #[test]
    fn test_import_counts() {
        let store = VersionedDataStore::in_memory();
        let summary = import(&store, &sample_feed()).unwrap();
        assert_eq!(summary.agencies, 1);
        assert_eq!(summary.stops, 6);
        assert_eq!(summary.routes, 2);
        assert_eq!(summary.route_types, 2);
        assert_eq!(summary.calendars, 2);
        assert_eq!(summary.inferred_calendars, 1);
        assert_eq!(summary.exceptions, 1);
        assert_eq!(summary.trip_patterns, 4);
        assert_eq!(summary.trips, 5);
        assert_eq!(summary.stop_times, 19);
        assert_eq!(summary.frequency_trips, 1);
        assert_eq!(summary.fares, 1);

        let tx = store.open_read_transaction("metro").unwrap();
        assert_eq!(tx.trips().len(), 5);
        assert_eq!(tx.trip_patterns().len(), 4);
        assert!(tx.routes().values().all(|r| r.status == StatusType::InProgress));
    }

    #[test]
    fn test_routes_with_identical_stops_get_distinct_patterns() {
        let store = VersionedDataStore::in_memory();
        import(&store, &sample_feed()).unwrap();
        let tx = store.open_read_transaction("metro").unwrap();
        let trip = |gtfs_id: &str| {
            tx.trips()
                .values()
                .find(|t| t.gtfs_trip_id.as_deref() == Some(gtfs_id))
                .unwrap()
                .clone()
        };
        let (t1, t2, t4, t5) = (trip("T1"), trip("T2"), trip("T4"), trip("T5"));
        assert_eq!(t1.pattern_id, t2.pattern_id);
        assert_ne!(t1.pattern_id, t4.pattern_id);
        assert_ne!(t1.pattern_id, t5.pattern_id);
        assert_ne!(t1.route_id, t4.route_id);
        for t in tx.trips().values() {
            let pattern = tx.trip_patterns().get(&t.pattern_id).unwrap();
            assert_eq!(t.stop_times.len(), pattern.pattern_stops.len());
            assert_eq!(t.route_id, pattern.route_id);
        }
    }

    #[test]
    fn test_pattern_and_trip_details() {
        let store = VersionedDataStore::in_memory();
        import(&store, &sample_feed()).unwrap();
        let tx = store.open_read_transaction("metro").unwrap();
        let t1 = tx
            .trips()
            .values()
            .find(|t| t.gtfs_trip_id.as_deref() == Some("T1"))
            .unwrap();
        let pattern = tx.trip_patterns().get(&t1.pattern_id).unwrap();
        assert_eq!(pattern.name, "Downtown");
        assert_eq!(pattern.pattern_direction, Some(TripDirection::A));
        assert!(pattern.shape.is_some());
        assert!(!pattern.use_straight_line_distances);
        assert_eq!(pattern.pattern_stops[0].default_travel_time, 0);
        let travel = pattern
            .pattern_stops
            .iter()
            .map(|ps| ps.default_travel_time)
            .collect_vec();
        // S2 is untimed; the 600 seconds to S3 split over two equal hops
        assert_eq!(travel[1] + travel[2], 600);
        assert!((travel[1] - 300).abs() <= 1);
        assert_eq!(travel[3], 300);
        assert_eq!(pattern.pattern_stops[1].timepoint, Some(false));

        // untimed stop times stay in the trip without times
        let s2 = t1.stop_times[1].as_ref().unwrap();
        assert_eq!(s2.arrival_time, None);

        let t5 = tx
            .trips()
            .values()
            .find(|t| t.gtfs_trip_id.as_deref() == Some("T5"))
            .unwrap();
        assert!(t5.use_frequency);
        assert_eq!(t5.headway_secs, Some(600));
        assert!(tx.trip_patterns().get(&t5.pattern_id).unwrap().use_frequency);
    }

    #[test]
    fn test_calendars_and_exceptions() {
        let store = VersionedDataStore::in_memory();
        import(&store, &sample_feed()).unwrap();
        let tx = store.open_read_transaction("metro").unwrap();
        let calendar = |service_id: &str| {
            tx.calendars()
                .values()
                .find(|c| c.gtfs_service_id.as_deref() == Some(service_id))
                .unwrap()
                .clone()
        };
        let weekday = calendar("WK");
        let saturday = calendar("SAT");
        assert_eq!(weekday.description.as_deref(), Some("MoTuWeThFr"));
        assert!(saturday.saturday && !saturday.monday);
        assert_eq!(saturday.start_date, ymd(2024, 7, 6));
        assert_eq!(saturday.end_date, ymd(2024, 7, 20));

        let exception = tx.exceptions().values().next().unwrap();
        assert_eq!(exception.dates, vec![ymd(2024, 7, 4)]);
        assert_eq!(
            exception.exemplar,
            ExemplarService::Swap {
                added: vec![],
                removed: vec![weekday.id.clone()],
            }
        );
        assert!(!exception.service_runs_on(&weekday, &ymd(2024, 7, 4)));
    }

    #[test]
    fn test_stops_agencies_and_global_tables() {
        let store = VersionedDataStore::in_memory();
        import(&store, &sample_feed()).unwrap();
        let tx = store.open_read_transaction("metro").unwrap();
        let stop = |gtfs_id: &str| {
            tx.stops()
                .values()
                .find(|s| s.gtfs_stop_id.as_deref() == Some(gtfs_id))
                .unwrap()
                .clone()
        };
        let station = stop("ST1");
        let entrance = stop("E1");
        assert_eq!(entrance.location, station.location);
        assert_eq!(entrance.parent_station, Some(station.id.clone()));
        assert_eq!(entrance.location_type, LocationType::Entrance);

        // R2 omits agency_id in a single agency feed
        let agency = tx.agencies().values().next().unwrap();
        assert!(tx
            .routes()
            .values()
            .all(|r| r.agency_id.as_deref() == Some(agency.id.as_str())));

        let global = store.global_tables().unwrap();
        let feed = global.feeds().get("metro").unwrap();
        assert_eq!(feed.feed_version.as_deref(), Some("v1"));
        assert!((feed.default_lat.unwrap() - 40.015).abs() < 1e-9);
        assert_eq!(global.route_types().len(), 2);
        assert!(global.route_type_for(GtfsRouteType::Bus).is_some());
    }

    #[test]
    fn test_reimport_replaces_and_snapshots() {
        let store = VersionedDataStore::in_memory();
        let first = import(&store, &sample_feed()).unwrap();
        let second = import(&store, &sample_feed()).unwrap();
        assert!(second.snapshot_version > first.snapshot_version);
        // route types are shared, not duplicated
        assert_eq!(second.route_types, 0);

        let tx = store.open_read_transaction("metro").unwrap();
        assert_eq!(tx.trips().len(), 5);
        assert_eq!(tx.stops().len(), 6);

        let snapshots = store.snapshot_manager().list_snapshots("metro").unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots.iter().filter(|s| s.current).count(), 1);
        let current = store
            .snapshot_manager()
            .current_snapshot("metro")
            .unwrap()
            .unwrap();
        assert_eq!(current.version, second.snapshot_version);
        assert_eq!(current.name, "Snapshot of metro");
    }

    #[test]
    fn test_import_builds_feed_while_global_tables_are_busy() {
        let store = VersionedDataStore::in_memory();
        let tables = sample_feed();
        let options = options();
        let cancel = CancelFlag::new();
        let (reporter, rx) = ProgressReporter::channel();

        // another writer holds the global tables and registers bus service
        let mut gtx = store.open_global_transaction().unwrap();
        let bus = RouteType::new(GtfsRouteType::Bus);
        let bus_id = bus.id.clone();
        gtx.route_types_mut().put(bus);

        let summary = std::thread::scope(|s| {
            let import =
                s.spawn(|| import_feed(&store, "metro", &tables, &options, &reporter, &cancel));
            let saving = rx.iter().find(|e| e.percent_complete >= 95.0 || e.error);
            assert!(!saving.unwrap().error);
            gtx.commit().unwrap();
            import.join().unwrap()
        })
        .unwrap();

        assert_eq!(summary.trips, 5);
        assert_eq!(summary.route_types, 1);
        let global = store.global_tables().unwrap();
        assert_eq!(global.route_types().len(), 2);
        assert!(global.feeds().contains_key("metro"));
        let tx = store.open_read_transaction("metro").unwrap();
        let bus_routes = tx
            .routes()
            .values()
            .filter(|r| r.gtfs_route_type == GtfsRouteType::Bus)
            .collect_vec();
        assert!(!bus_routes.is_empty());
        assert!(bus_routes
            .iter()
            .all(|r| r.route_type_id.as_deref() == Some(bus_id.as_str())));
    }

    #[test]
    fn test_failed_import_leaves_feed_untouched() {
        let store = VersionedDataStore::in_memory();
        import(&store, &sample_feed()).unwrap();

        let mut broken = sample_feed();
        broken.stop_times[0].stop_id = String::from("NOPE");
        let (reporter, rx) = ProgressReporter::channel();
        let result = import_feed(
            &store,
            "metro",
            &broken,
            &options(),
            &reporter,
            &CancelFlag::new(),
        );
        assert!(matches!(result, Err(GtfsError::InvalidData(_))));
        assert!(rx.try_iter().last().unwrap().error);

        let tx = store.open_read_transaction("metro").unwrap();
        assert_eq!(tx.trips().len(), 5);
        assert_eq!(
            store.snapshot_manager().list_snapshots("metro").unwrap().len(),
            1
        );
        // the writer was released
        assert!(store.try_open_transaction("metro").is_ok());
    }

    #[test]
    fn test_cancelled_import_rolls_back() {
        let store = VersionedDataStore::in_memory();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = import_feed(
            &store,
            "metro",
            &sample_feed(),
            &options(),
            &ProgressReporter::silent(),
            &cancel,
        );
        assert!(matches!(result, Err(GtfsError::Cancelled)));
        let tx = store.open_read_transaction("metro").unwrap();
        assert!(tx.trips().is_empty());
        assert!(store.global_tables().unwrap().feeds().is_empty());
    }
}
