//! loads a canonical GTFS feed into the editor model.
mod calendar_inference;
mod import_config;
mod import_ops;
mod import_summary;
mod pattern_builder;

pub use calendar_inference::{calendar_from_record, infer_calendar, swap_exceptions};
pub use import_config::{ImportConfig, ImportOptions};
pub use import_ops::import_feed;
pub use import_summary::ImportSummary;
pub use pattern_builder::{build_pattern, interpolate_travel_times, PatternKey, PatternSource};
