//! canonical GTFS tables and their file format.
mod feed_io;
mod feed_tables;
pub mod gtfs_serde_ops;
pub mod records;

pub use feed_io::{
    read_canonical_feed, write_canonical_feed, AGENCY_FILE, CALENDAR_DATES_FILE, CALENDAR_FILE,
    FARE_ATTRIBUTES_FILE, FARE_RULES_FILE, FEED_INFO_FILE, FREQUENCIES_FILE, ROUTES_FILE,
    SHAPES_FILE, STOPS_FILE, STOP_TIMES_FILE, TRIPS_FILE,
};
pub use feed_tables::FeedTables;
pub use records::*;
