use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use super::{indices::Indices, table::Table};
use crate::model::{
    Agency, EditorFeed, Entity, Fare, GtfsRouteType, Route, RouteType, ScheduleException,
    ServiceCalendar, Stop, Trip, TripPattern,
};

/// the editable tables of one feed plus their derived [`Indices`].
///
/// cloning is cheap: tables share rows until written. indices are built on
/// first use and dropped whenever a table is borrowed mutably.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableGroup {
    agencies: Table<Agency>,
    stops: Table<Stop>,
    routes: Table<Route>,
    calendars: Table<ServiceCalendar>,
    exceptions: Table<ScheduleException>,
    trip_patterns: Table<TripPattern>,
    trips: Table<Trip>,
    fares: Table<Fare>,
    #[serde(skip)]
    indices: OnceLock<Arc<Indices>>,
}

macro_rules! table_accessors {
    ($($field:ident, $field_mut:ident: $entity:ty;)*) => {
        $(
            pub fn $field(&self) -> &Table<$entity> {
                &self.$field
            }

            pub fn $field_mut(&mut self) -> &mut Table<$entity> {
                self.indices = OnceLock::new();
                &mut self.$field
            }
        )*
    };
}

impl TableGroup {
    table_accessors! {
        agencies, agencies_mut: Agency;
        stops, stops_mut: Stop;
        routes, routes_mut: Route;
        calendars, calendars_mut: ServiceCalendar;
        exceptions, exceptions_mut: ScheduleException;
        trip_patterns, trip_patterns_mut: TripPattern;
        trips, trips_mut: Trip;
        fares, fares_mut: Fare;
    }

    /// secondary indices for the current contents of the tables.
    pub fn indices(&self) -> &Indices {
        self.indices
            .get_or_init(|| Arc::new(Indices::build(self)))
            .as_ref()
    }

    /// drops and rebuilds the indices from the tables.
    pub fn rebuild_indices(&mut self) {
        let indices = Arc::new(Indices::build(self));
        self.indices = OnceLock::from(indices);
    }

    /// empties every table.
    pub fn clear(&mut self) {
        self.agencies.clear();
        self.stops.clear();
        self.routes.clear();
        self.calendars.clear();
        self.exceptions.clear();
        self.trip_patterns.clear();
        self.trips.clear();
        self.fares.clear();
        self.indices = OnceLock::new();
    }

    /// trips on a route, in id order
    pub fn trips_for_route(&self, route_id: &str) -> Vec<&Trip> {
        self.resolve_trips(self.indices().trips_by_route(route_id))
    }

    pub fn trips_for_pattern(&self, pattern_id: &str) -> Vec<&Trip> {
        self.resolve_trips(self.indices().trips_by_pattern(pattern_id))
    }

    pub fn trips_for_calendar(&self, calendar_id: &str) -> Vec<&Trip> {
        self.resolve_trips(self.indices().trips_by_calendar(calendar_id))
    }

    pub fn patterns_for_route(&self, route_id: &str) -> Vec<&TripPattern> {
        self.indices()
            .patterns_by_route(route_id)
            .into_iter()
            .filter_map(|id| self.trip_patterns.get(id))
            .collect()
    }

    /// patterns with at least one pattern stop at the stop
    pub fn patterns_for_stop(&self, stop_id: &str) -> Vec<&TripPattern> {
        self.indices()
            .patterns_by_stop(stop_id)
            .into_iter()
            .filter_map(|id| self.trip_patterns.get(id))
            .collect()
    }

    fn resolve_trips(&self, ids: Vec<&str>) -> Vec<&Trip> {
        ids.into_iter().filter_map(|id| self.trips.get(id)).collect()
    }

    /// copy of every row with its owning feed id replaced
    pub fn with_feed_id(&self, feed_id: &str) -> TableGroup {
        TableGroup {
            agencies: retag(&self.agencies, |e| e.feed_id = feed_id.to_string()),
            stops: retag(&self.stops, |e| e.feed_id = feed_id.to_string()),
            routes: retag(&self.routes, |e| e.feed_id = feed_id.to_string()),
            calendars: retag(&self.calendars, |e| e.feed_id = feed_id.to_string()),
            exceptions: retag(&self.exceptions, |e| e.feed_id = feed_id.to_string()),
            trip_patterns: retag(&self.trip_patterns, |e| e.feed_id = feed_id.to_string()),
            trips: retag(&self.trips, |e| e.feed_id = feed_id.to_string()),
            fares: retag(&self.fares, |e| e.feed_id = feed_id.to_string()),
            indices: OnceLock::new(),
        }
    }

    /// true when every table has the same rows as `other`
    pub fn same_contents(&self, other: &TableGroup) -> bool {
        self.agencies == other.agencies
            && self.stops == other.stops
            && self.routes == other.routes
            && self.calendars == other.calendars
            && self.exceptions == other.exceptions
            && self.trip_patterns == other.trip_patterns
            && self.trips == other.trips
            && self.fares == other.fares
    }
}

fn retag<T: Entity>(table: &Table<T>, op: impl Fn(&mut T)) -> Table<T> {
    table
        .values()
        .cloned()
        .map(|mut entity| {
            op(&mut entity);
            entity
        })
        .collect()
}

/// tables shared by every feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalTables {
    feeds: Table<EditorFeed>,
    route_types: Table<RouteType>,
}

impl GlobalTables {
    pub fn feeds(&self) -> &Table<EditorFeed> {
        &self.feeds
    }

    pub fn feeds_mut(&mut self) -> &mut Table<EditorFeed> {
        &mut self.feeds
    }

    pub fn route_types(&self) -> &Table<RouteType> {
        &self.route_types
    }

    pub fn route_types_mut(&mut self) -> &mut Table<RouteType> {
        &mut self.route_types
    }

    pub fn route_type_for(&self, gtfs_route_type: GtfsRouteType) -> Option<&RouteType> {
        self.route_types
            .values()
            .find(|rt| rt.gtfs_route_type == gtfs_route_type)
    }
}
