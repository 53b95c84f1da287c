use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use transit_editor_core::{
    model::{
        AttributeAvailability, Route, ServiceCalendar, StatusType, Stop, Trip, TripPattern,
    },
    store::{GlobalTables, StoreError, Transaction, VersionedDataStore},
    util::geo_utils,
};

use super::{ExportOptions, ExportSummary, SkippedTrip};
use crate::{
    feed::{
        AgencyRecord, CalendarDateRecord, CalendarRecord, FareAttributeRecord, FareRuleRecord,
        FeedInfoRecord, FeedTables, FrequencyRecord, RouteRecord, ShapePointRecord, StopRecord,
        StopTimeRecord, TripRecord, EXCEPTION_TYPE_ADDED, EXCEPTION_TYPE_REMOVED,
    },
    gtfs_error::{batch_processing_error, GtfsError},
    job::ProgressReporter,
};

/// a feed to export, at its live state or at a snapshot version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSource {
    pub feed_id: String,
    pub version: Option<u32>,
}

impl ExportSource {
    pub fn live(feed_id: &str) -> ExportSource {
        ExportSource {
            feed_id: feed_id.to_string(),
            version: None,
        }
    }

    pub fn snapshot(feed_id: &str, version: u32) -> ExportSource {
        ExportSource {
            feed_id: feed_id.to_string(),
            version: Some(version),
        }
    }
}

/// writes one or more feeds into a single set of canonical GTFS tables.
///
/// all sources are opened before anything is written, so the export reads a
/// consistent state of each feed. where two feeds produce a row with the same
/// GTFS id, the row of the earlier source is kept.
///
/// # Arguments
///
/// * `store` - store holding the feeds
/// * `sources` - feeds to export, in priority order
/// * `options` - export filters
/// * `reporter` - receives progress updates
///
/// # Returns
///
/// the GTFS tables along with counts of what was written and which trips were skipped
pub fn export_feeds(
    store: &VersionedDataStore,
    sources: &[ExportSource],
    options: &ExportOptions,
    reporter: &ProgressReporter,
) -> Result<(FeedTables, ExportSummary), GtfsError> {
    let (transactions, errors): (Vec<_>, Vec<_>) = sources
        .iter()
        .map(|source| open_source(store, source))
        .partition(Result::is_ok);
    if !errors.is_empty() {
        let errors = errors.into_iter().filter_map(Result::err).collect::<Vec<_>>();
        let error = batch_processing_error(&errors);
        reporter.fail(&error.to_string());
        return Err(error);
    }
    let globals = store.global_tables()?;

    let mut writer = GtfsWriter::new(*options);
    let total = transactions.len().max(1);
    for (idx, tx) in transactions.into_iter().filter_map(Result::ok).enumerate() {
        reporter.report(
            100.0 * idx as f64 / total as f64,
            &format!("Exporting feed {}", tx.feed_id()),
        );
        writer.write_feed(&tx, &globals)?;
    }
    let GtfsWriter {
        output, summary, ..
    } = writer;
    log::info!(
        "exported {} feeds: {} agencies; {} routes; {} stops; {} trips; {} stop times; {} trips skipped",
        summary.feeds,
        summary.agencies,
        summary.routes,
        summary.stops,
        summary.trips,
        summary.stop_times,
        summary.skipped_trips.len()
    );
    reporter.report(100.0, "Export complete!");
    Ok((output, summary))
}

fn open_source(
    store: &VersionedDataStore,
    source: &ExportSource,
) -> Result<Transaction, GtfsError> {
    let tx = match source.version {
        Some(version) => store.open_snapshot_transaction(&source.feed_id, version)?,
        None => {
            if !store.feed_exists(&source.feed_id)? {
                return Err(GtfsError::Store(StoreError::NotFound(format!(
                    "feed {} does not exist",
                    source.feed_id
                ))));
            }
            store.open_read_transaction(&source.feed_id)?
        }
    };
    Ok(tx)
}

/// rows of one exported trip
struct TripRows {
    trip: TripRecord,
    stop_times: Vec<StopTimeRecord>,
    frequency: Option<FrequencyRecord>,
}

/// accumulates the GTFS tables of several feeds, remembering which ids were
/// already written.
struct GtfsWriter {
    options: ExportOptions,
    output: FeedTables,
    summary: ExportSummary,
    empty_agency_written: bool,
    agency_ids: HashSet<String>,
    stop_ids: HashSet<String>,
    route_ids: HashSet<String>,
    service_ids: HashSet<String>,
    calendar_dates: HashSet<(String, chrono::NaiveDate)>,
    trip_ids: HashSet<String>,
    shape_ids: HashSet<String>,
    fare_ids: HashSet<String>,
}

impl GtfsWriter {
    fn new(options: ExportOptions) -> GtfsWriter {
        GtfsWriter {
            options,
            output: FeedTables::default(),
            summary: ExportSummary::default(),
            empty_agency_written: false,
            agency_ids: HashSet::new(),
            stop_ids: HashSet::new(),
            route_ids: HashSet::new(),
            service_ids: HashSet::new(),
            calendar_dates: HashSet::new(),
            trip_ids: HashSet::new(),
            shape_ids: HashSet::new(),
            fare_ids: HashSet::new(),
        }
    }

    fn write_feed(&mut self, tx: &Transaction, globals: &GlobalTables) -> Result<(), GtfsError> {
        let feed_id = tx.feed_id().to_string();
        log::debug!("exporting feed {feed_id}");
        self.write_feed_info(&feed_id, globals);
        let agency_ids = self.write_agencies(tx);
        let service_ids = self.write_calendars(tx)?;
        let route_ids = self.write_routes(tx, &agency_ids);

        let mut referenced_stops: BTreeSet<String> = BTreeSet::new();
        for trip in tx.trips().values() {
            let trip_id = trip.gtfs_id();
            let Some(route_id) = route_ids.get(trip.route_id.as_str()) else {
                log::warn!(
                    "trip {trip_id} belongs to route {} which was not exported, skipping",
                    trip.route_id
                );
                self.skip_trip(&feed_id, &trip_id, "route was not exported");
                continue;
            };
            if trip_id.is_empty() {
                log::warn!("trip {} has no GTFS id, skipping", trip.id);
                self.skip_trip(&feed_id, &trip.id, "trip has no GTFS id");
                continue;
            }
            if self.trip_ids.contains(&trip_id) {
                log::warn!("trip id {trip_id} of feed {feed_id} was already exported, skipping");
                self.skip_trip(&feed_id, &trip_id, "duplicate trip id");
                continue;
            }
            let rows = match self.trip_rows(tx, trip, route_id, &service_ids) {
                Ok(rows) => rows,
                Err(e) => {
                    log::error!("unable to export trip {trip_id}: {e}");
                    self.skip_trip(&feed_id, &trip_id, &e.to_string());
                    continue;
                }
            };
            for stop_time in trip.stop_times.iter().flatten() {
                referenced_stops.insert(stop_time.stop_id.clone());
            }
            if let Some(pattern) = tx.trip_patterns().get(&trip.pattern_id) {
                self.write_shape(pattern);
            }
            self.trip_ids.insert(trip_id);
            self.summary.trips += 1;
            self.summary.stop_times += rows.stop_times.len();
            self.output.trips.push(rows.trip);
            self.output.stop_times.extend(rows.stop_times);
            if let Some(frequency) = rows.frequency {
                self.summary.frequencies += 1;
                self.output.frequencies.push(frequency);
            }
        }

        self.write_stops(tx, &referenced_stops);
        self.write_fares(tx, &agency_ids);
        self.summary.feeds += 1;
        Ok(())
    }

    fn skip_trip(&mut self, feed_id: &str, trip_id: &str, reason: &str) {
        self.summary.skipped_trips.push(SkippedTrip {
            feed_id: feed_id.to_string(),
            trip_id: trip_id.to_string(),
            reason: reason.to_string(),
        });
    }

    fn write_feed_info(&mut self, feed_id: &str, globals: &GlobalTables) {
        if !self.output.feed_info.is_empty() {
            return;
        }
        let Some(feed) = globals.feeds().get(feed_id) else {
            return;
        };
        if feed.feed_publisher_name.is_none() && feed.feed_version.is_none() {
            return;
        }
        self.output.feed_info.push(FeedInfoRecord {
            feed_publisher_name: feed.feed_publisher_name.clone(),
            feed_publisher_url: feed.feed_publisher_url.clone(),
            feed_lang: feed.feed_lang.clone(),
            feed_start_date: feed.feed_start_date,
            feed_end_date: feed.feed_end_date,
            feed_version: feed.feed_version.clone(),
        });
    }

    /// GTFS agency id by internal agency id. agencies without a GTFS id are
    /// written with an empty id, and only the first of them is kept.
    fn write_agencies(&mut self, tx: &Transaction) -> HashMap<String, String> {
        let mut agency_ids = HashMap::new();
        for agency in tx.agencies().values() {
            let gtfs_id = agency.gtfs_agency_id.clone().unwrap_or_default();
            agency_ids.insert(agency.id.clone(), gtfs_id.clone());
            if gtfs_id.is_empty() {
                if self.empty_agency_written {
                    log::warn!(
                        "agency {} has no agency id but another agency without an id was already exported, skipping",
                        agency.name
                    );
                    continue;
                }
                self.empty_agency_written = true;
            } else if !self.agency_ids.insert(gtfs_id.clone()) {
                log::warn!("agency id {gtfs_id} was already exported, skipping");
                continue;
            }
            self.output.agencies.push(AgencyRecord {
                agency_id: Some(gtfs_id).filter(|id| !id.is_empty()),
                agency_name: agency.name.clone(),
                agency_url: agency.url.clone().unwrap_or_default(),
                agency_timezone: agency.timezone.clone(),
                agency_lang: agency.lang.clone(),
                agency_phone: agency.phone.clone(),
                agency_fare_url: agency.fare_url.clone(),
                agency_email: agency.email.clone(),
            });
            self.summary.agencies += 1;
        }
        agency_ids
    }

    /// GTFS service id by internal calendar id.
    fn write_calendars(&mut self, tx: &Transaction) -> Result<HashMap<String, String>, GtfsError> {
        let mut service_ids = HashMap::new();
        for calendar in tx.calendars().values() {
            let service_id = service_id(calendar);
            service_ids.insert(calendar.id.clone(), service_id.clone());
            if !self.service_ids.insert(service_id.clone()) {
                log::warn!("service id {service_id} was already exported, skipping");
                continue;
            }
            self.output.calendars.push(CalendarRecord {
                service_id: service_id.clone(),
                monday: calendar.monday as u8,
                tuesday: calendar.tuesday as u8,
                wednesday: calendar.wednesday as u8,
                thursday: calendar.thursday as u8,
                friday: calendar.friday as u8,
                saturday: calendar.saturday as u8,
                sunday: calendar.sunday as u8,
                start_date: calendar.start_date,
                end_date: calendar.end_date,
            });
            self.summary.calendars += 1;

            for exception in tx.exceptions().values() {
                if !exception.applies_to(calendar) {
                    continue;
                }
                for date in exception.dates.iter().filter(|d| calendar.contains(d)) {
                    if !self.calendar_dates.insert((service_id.clone(), *date)) {
                        return Err(GtfsError::DuplicateException {
                            service_id: service_id.clone(),
                            date: *date,
                        });
                    }
                    let exception_type = if exception.service_runs_on(calendar, date) {
                        EXCEPTION_TYPE_ADDED
                    } else {
                        EXCEPTION_TYPE_REMOVED
                    };
                    self.output.calendar_dates.push(CalendarDateRecord {
                        service_id: service_id.clone(),
                        date: *date,
                        exception_type,
                    });
                    self.summary.calendar_dates += 1;
                }
            }
        }
        Ok(service_ids)
    }

    /// GTFS route id by internal route id, for the routes that were exported.
    fn write_routes(
        &mut self,
        tx: &Transaction,
        agency_ids: &HashMap<String, String>,
    ) -> HashMap<String, String> {
        let mut route_ids = HashMap::new();
        for route in tx.routes().values() {
            let route_id = route.gtfs_id();
            if route.status != StatusType::Approved && !self.options.ignore_route_status {
                log::warn!(
                    "route {route_id} has status {} and is not approved, skipping",
                    route.status
                );
                self.summary.skipped_routes += 1;
                continue;
            }
            if !self.route_ids.insert(route_id.clone()) {
                log::warn!("route id {route_id} was already exported, skipping");
                continue;
            }
            self.output.routes.push(route_record(route, &route_id, agency_ids));
            route_ids.insert(route.id.clone(), route_id);
            self.summary.routes += 1;
        }
        route_ids
    }

    fn trip_rows(
        &self,
        tx: &Transaction,
        trip: &Trip,
        route_id: &str,
        service_ids: &HashMap<String, String>,
    ) -> Result<TripRows, StoreError> {
        let trip_id = trip.gtfs_id();
        let route = tx.routes().try_get(&trip.route_id)?;
        let pattern = tx.trip_patterns().try_get(&trip.pattern_id)?;
        let service_id = service_ids.get(&trip.calendar_id).ok_or_else(|| {
            StoreError::ConsistencyViolation(format!(
                "trip {trip_id} references missing calendar {}",
                trip.calendar_id
            ))
        })?;
        let shape_id = exports_shape(pattern).then(|| pattern.id.clone());

        let wheelchair = match trip.wheelchair_boarding {
            AttributeAvailability::Unknown => route.wheelchair_boarding,
            other => other,
        };
        let record = TripRecord {
            route_id: route_id.to_string(),
            service_id: service_id.clone(),
            trip_id: trip_id.clone(),
            trip_headsign: trip.trip_headsign.clone(),
            trip_short_name: trip.trip_short_name.clone(),
            direction_id: pattern
                .pattern_direction
                .or(trip.trip_direction)
                .map(|d| d.to_gtfs()),
            block_id: trip.block_id.clone(),
            shape_id,
            wheelchair_accessible: Some(wheelchair.to_gtfs()),
        };
        let stop_times = stop_time_rows(tx, trip, &trip_id, pattern)?;

        let frequency = if trip.use_frequency {
            match (trip.start_time, trip.end_time, trip.headway_secs) {
                (Some(start_time), Some(end_time), Some(headway_secs)) => Some(FrequencyRecord {
                    trip_id: trip_id.clone(),
                    start_time,
                    end_time,
                    headway_secs,
                    exact_times: Some(0),
                }),
                _ => {
                    return Err(StoreError::ConsistencyViolation(format!(
                        "frequency trip {trip_id} is missing its start time, end time or headway"
                    )))
                }
            }
        } else {
            None
        };

        Ok(TripRows {
            trip: record,
            stop_times,
            frequency,
        })
    }

    /// writes the points of a pattern's shape the first time the pattern is seen.
    fn write_shape(&mut self, pattern: &TripPattern) {
        let Some(shape) = pattern.shape.as_ref().filter(|_| exports_shape(pattern)) else {
            return;
        };
        if !self.shape_ids.insert(pattern.id.clone()) {
            return;
        }
        let distances = geo_utils::get_coord_distances(shape);
        for (idx, (coord, distance)) in shape.coords().zip(distances).enumerate() {
            self.output.shapes.push(ShapePointRecord {
                shape_id: pattern.id.clone(),
                shape_pt_lat: coord.y,
                shape_pt_lon: coord.x,
                shape_pt_sequence: idx as u32 + 1,
                shape_dist_traveled: Some(distance),
            });
        }
        self.summary.shapes += 1;
    }

    /// writes the referenced stops and the stations they belong to.
    fn write_stops(&mut self, tx: &Transaction, referenced: &BTreeSet<String>) {
        let mut pending: Vec<&Stop> = vec![];
        let mut included: HashSet<&str> = HashSet::new();
        for stop_id in referenced.iter() {
            if let Some(stop) = tx.stops().get(stop_id) {
                if included.insert(stop.id.as_str()) {
                    pending.push(stop);
                }
            }
        }
        let mut idx = 0;
        while idx < pending.len() {
            let stop = pending[idx];
            if let Some(parent) = stop.parent_station.as_deref().and_then(|p| tx.stops().get(p)) {
                if included.insert(parent.id.as_str()) {
                    pending.push(parent);
                }
            }
            idx += 1;
        }

        for stop in pending {
            let stop_id = stop.gtfs_id();
            if !self.stop_ids.insert(stop_id.clone()) {
                log::warn!("stop id {stop_id} was already exported, skipping");
                continue;
            }
            let parent_station = stop
                .parent_station
                .as_deref()
                .and_then(|p| tx.stops().get(p))
                .map(|parent| parent.gtfs_id());
            self.output.stops.push(StopRecord {
                stop_id,
                stop_code: stop.stop_code.clone(),
                stop_name: Some(stop.stop_name.clone()),
                stop_desc: stop.stop_desc.clone(),
                stop_lat: Some(stop.lat()),
                stop_lon: Some(stop.lon()),
                zone_id: stop.zone_id.clone(),
                stop_url: stop.stop_url.clone(),
                location_type: Some(stop.location_type.to_gtfs()),
                parent_station,
                stop_timezone: stop.stop_timezone.clone(),
                wheelchair_boarding: Some(stop.wheelchair_boarding.to_gtfs()),
            });
            self.summary.stops += 1;
        }
    }

    fn write_fares(&mut self, tx: &Transaction, agency_ids: &HashMap<String, String>) {
        for fare in tx.fares().values() {
            if !self.fare_ids.insert(fare.gtfs_fare_id.clone()) {
                log::warn!("fare id {} was already exported, skipping", fare.gtfs_fare_id);
                continue;
            }
            self.output.fare_attributes.push(FareAttributeRecord {
                fare_id: fare.gtfs_fare_id.clone(),
                price: fare.price,
                currency_type: fare.currency_type.clone(),
                payment_method: fare.payment_method,
                transfers: fare.transfers,
                agency_id: fare
                    .agency_id
                    .as_ref()
                    .and_then(|id| agency_ids.get(id))
                    .filter(|id| !id.is_empty())
                    .cloned(),
                transfer_duration: fare.transfer_duration,
            });
            for rule in fare.fare_rules.iter() {
                self.output.fare_rules.push(FareRuleRecord {
                    fare_id: fare.gtfs_fare_id.clone(),
                    route_id: rule.route_id.clone(),
                    origin_id: rule.origin_id.clone(),
                    destination_id: rule.destination_id.clone(),
                    contains_id: rule.contains_id.clone(),
                });
            }
            self.summary.fares += 1;
        }
    }
}

fn service_id(calendar: &ServiceCalendar) -> String {
    match &calendar.gtfs_service_id {
        Some(service_id) if !service_id.is_empty() => service_id.clone(),
        _ => calendar.id.clone(),
    }
}

/// patterns whose distances were measured along a real shape export that shape.
fn exports_shape(pattern: &TripPattern) -> bool {
    pattern.shape.is_some() && !pattern.use_straight_line_distances
}

fn route_record(route: &Route, route_id: &str, agency_ids: &HashMap<String, String>) -> RouteRecord {
    RouteRecord {
        route_id: route_id.to_string(),
        agency_id: route
            .agency_id
            .as_ref()
            .and_then(|id| agency_ids.get(id))
            .filter(|id| !id.is_empty())
            .cloned(),
        route_short_name: route.route_short_name.clone(),
        route_long_name: route.route_long_name.clone(),
        route_desc: route.route_desc.clone(),
        route_type: route.gtfs_route_type.to_gtfs(),
        route_url: route.route_url.clone(),
        route_color: route.route_color.clone(),
        route_text_color: route.route_text_color.clone(),
        route_branding_url: route.route_branding_url.clone(),
    }
}

/// stop times of a trip, numbered from 1 over the slots that are present.
/// frequency trips take their times from the pattern's default travel and
/// dwell times, starting at 0.
fn stop_time_rows(
    tx: &Transaction,
    trip: &Trip,
    trip_id: &str,
    pattern: &TripPattern,
) -> Result<Vec<StopTimeRecord>, StoreError> {
    if trip.stop_times.len() != pattern.pattern_stops.len() {
        return Err(StoreError::ConsistencyViolation(format!(
            "trip {trip_id} has {} stop times but pattern {} has {} stops",
            trip.stop_times.len(),
            pattern.id,
            pattern.pattern_stops.len()
        )));
    }
    let mut rows = vec![];
    let mut cumulative = 0;
    for (pattern_stop, slot) in pattern.pattern_stops.iter().zip(trip.stop_times.iter()) {
        let arrival = cumulative + pattern_stop.default_travel_time;
        let departure = arrival + pattern_stop.default_dwell_time;
        cumulative = departure;
        let Some(stop_time) = slot else {
            continue;
        };
        if stop_time.stop_id != pattern_stop.stop_id {
            return Err(StoreError::ConsistencyViolation(format!(
                "trip {trip_id} stop time {} is at stop {} but pattern {} has stop {} there",
                rows.len() + 1,
                stop_time.stop_id,
                pattern.id,
                pattern_stop.stop_id
            )));
        }
        let stop = tx.stops().try_get(&stop_time.stop_id)?;
        let (arrival_time, departure_time) = if trip.use_frequency {
            (Some(arrival), Some(departure))
        } else {
            (stop_time.arrival_time, stop_time.departure_time)
        };
        rows.push(StopTimeRecord {
            trip_id: trip_id.to_string(),
            arrival_time,
            departure_time,
            stop_id: stop.gtfs_id(),
            stop_sequence: rows.len() as u32 + 1,
            stop_headsign: stop_time.stop_headsign.clone(),
            pickup_type: stop_time.pickup_type.or(stop.pickup_type).map(|p| p.to_gtfs()),
            drop_off_type: stop_time
                .drop_off_type
                .or(stop.drop_off_type)
                .map(|d| d.to_gtfs()),
            shape_dist_traveled: pattern_stop.shape_dist_traveled,
            timepoint: pattern_stop.timepoint.map(|t| t as i32),
        });
    }
    Ok(rows)
}
