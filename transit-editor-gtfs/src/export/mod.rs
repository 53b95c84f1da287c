//! writes editor feeds back out as canonical GTFS tables.
mod export_config;
mod export_ops;
mod export_summary;

pub use export_config::{ExportConfig, ExportOptions};
pub use export_ops::{export_feeds, ExportSource};
pub use export_summary::{ExportSummary, SkippedTrip};
