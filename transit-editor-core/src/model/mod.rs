mod agency;
mod editor_feed;
mod fare;
mod gtfs_enums;
mod ids;
mod route;
mod schedule_exception;
mod service_calendar;
mod snapshot;
mod stop;
mod trip;
mod trip_pattern;

pub use agency::Agency;
pub use editor_feed::EditorFeed;
pub use fare::{Fare, FareRule};
pub use gtfs_enums::{
    AttributeAvailability, GtfsRouteType, LocationType, PickupDropOffType, StatusType,
    TripDirection,
};
pub use ids::new_id;
pub use route::{Route, RouteType};
pub use schedule_exception::{ExemplarService, ScheduleException};
pub use service_calendar::ServiceCalendar;
pub use snapshot::{Snapshot, SnapshotId};
pub use stop::Stop;
pub use trip::{StopTime, Trip};
pub use trip_pattern::{TripPattern, TripPatternStop};

/// an entity stored in a [`crate::store::Table`], addressed by an opaque string id.
pub trait Entity: Clone {
    /// name of the table holding this entity type, used in error messages
    const TABLE: &'static str;

    fn id(&self) -> &str;
}
