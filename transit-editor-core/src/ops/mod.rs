//! editing operations that keep trips, patterns, stops and calendars consistent.
//! each runs inside the caller's [`crate::store::Transaction`] and leaves
//! committing to the caller.
pub mod calendar_ops;
pub mod pattern_ops;
pub mod reconcile;
pub mod stop_ops;
pub mod trip_ops;

pub use calendar_ops::{delete_calendar, put_schedule_exception};
pub use pattern_ops::{
    create_trip_pattern, delete_route, delete_trip_pattern, pattern_stop_locations,
    update_trip_pattern, RouteDeletion,
};
pub use reconcile::{diff_pattern_stops, reconcile_pattern_stops, PatternStopEdit};
pub use stop_ops::{delete_stop, find_duplicate_stops, merge_stops, MergeSummary};
pub use trip_ops::{create_trip, put_trip, validate_trip};
