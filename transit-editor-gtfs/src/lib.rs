pub mod export;
pub mod feed;
pub mod gtfs_error;
pub mod import;
pub mod job;

#[cfg(test)]
mod test_feed;

pub use export::{export_feeds, ExportConfig, ExportOptions, ExportSource, ExportSummary};
pub use feed::{read_canonical_feed, write_canonical_feed, FeedTables};
pub use gtfs_error::GtfsError;
pub use import::{import_feed, ImportConfig, ImportOptions, ImportSummary};
pub use job::{CancelFlag, ProgressReporter, StatusEvent};
