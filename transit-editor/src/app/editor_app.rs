use std::path::Path;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use transit_editor_core::{
    model::{SnapshotId, StatusType},
    ops,
    store::VersionedDataStore,
};
use transit_editor_gtfs::{
    export_feeds, import_feed, read_canonical_feed, write_canonical_feed, CancelFlag,
    ExportOptions, ExportSource, ImportOptions,
};

use super::{run_with_progress, EditorAppError, StoreArgs};

/// Command line tool for importing, editing, snapshotting and exporting GTFS feeds
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct EditorApp {
    #[command(subcommand)]
    pub op: EditorOperation,
}

#[derive(Debug, Clone, Serialize, Deserialize, Subcommand)]
pub enum EditorOperation {
    /// replace the contents of a feed with a GTFS directory or zip archive
    Import {
        /// feed to import into. any existing contents are replaced.
        #[arg(long)]
        feed_id: String,

        /// GTFS directory or .zip archive
        #[arg(long)]
        input: String,

        /// status of the imported routes, overrides import.route_status
        #[arg(long)]
        route_status: Option<StatusType>,

        /// name of the snapshot taken after import, overrides import.snapshot_name
        #[arg(long)]
        snapshot_name: Option<String>,

        #[command(flatten)]
        store_args: StoreArgs,
    },
    /// write one or more feeds as a GTFS directory or zip archive
    Export {
        /// feed to export as FEED_ID or FEED_ID:VERSION for a snapshot. may be
        /// repeated; on id collisions the earlier feed wins.
        #[arg(long = "feed", required = true, value_parser = parse_export_source)]
        feeds: Vec<ExportSource>,

        /// destination directory, or archive when ending in .zip
        #[arg(long)]
        output: String,

        /// export routes that are not approved
        #[arg(long)]
        ignore_route_status: bool,

        #[command(flatten)]
        store_args: StoreArgs,
    },
    /// freeze the committed state of a feed as a new snapshot
    Snapshot {
        #[arg(long)]
        feed_id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        comment: Option<String>,

        /// leave the current snapshot of the feed unchanged
        #[arg(long)]
        keep_current: bool,

        #[command(flatten)]
        store_args: StoreArgs,
    },
    /// print the snapshots of a feed as JSON
    ListSnapshots {
        #[arg(long)]
        feed_id: String,

        #[command(flatten)]
        store_args: StoreArgs,
    },
    /// replace the live state of a feed with one of its snapshots
    Restore {
        #[arg(long)]
        feed_id: String,

        #[arg(long)]
        version: u32,

        #[command(flatten)]
        store_args: StoreArgs,
    },
    /// merge stops into the first stop listed
    MergeStops {
        #[arg(long)]
        feed_id: String,

        /// internal stop ids. the first stop is kept.
        #[arg(long, num_args = 2.., required = true)]
        stop_ids: Vec<String>,

        #[command(flatten)]
        store_args: StoreArgs,
    },
    /// print groups of stops that lie within a distance of each other
    DuplicateStops {
        #[arg(long)]
        feed_id: String,

        #[arg(long, default_value_t = 10.0)]
        tolerance_meters: f64,

        #[command(flatten)]
        store_args: StoreArgs,
    },
    /// delete a route along with its patterns and trips
    DeleteRoute {
        #[arg(long)]
        feed_id: String,

        /// internal route id
        #[arg(long)]
        route_id: String,

        #[command(flatten)]
        store_args: StoreArgs,
    },
}

impl EditorOperation {
    pub fn run(&self) -> Result<(), EditorAppError> {
        match self {
            EditorOperation::Import {
                feed_id,
                input,
                route_status,
                snapshot_name,
                store_args,
            } => {
                let config = store_args.load()?;
                let mut options = ImportOptions::from(&config.import);
                if let Some(status) = route_status {
                    options.route_status = *status;
                }
                if let Some(name) = snapshot_name {
                    options.snapshot_name = Some(name.clone());
                }
                let store = VersionedDataStore::open(&config.store)?;
                let tables = read_canonical_feed(Path::new(input))?;
                let cancel = CancelFlag::new();
                let summary = run_with_progress("GTFS import", |reporter| {
                    import_feed(&store, feed_id, &tables, &options, reporter, &cancel)
                })?;
                print_json(&summary)
            }
            EditorOperation::Export {
                feeds,
                output,
                ignore_route_status,
                store_args,
            } => {
                let config = store_args.load()?;
                let mut options = ExportOptions::from(&config.export);
                options.ignore_route_status |= *ignore_route_status;
                let store = VersionedDataStore::open(&config.store)?;
                let (tables, summary) = run_with_progress("GTFS export", |reporter| {
                    export_feeds(&store, feeds, &options, reporter)
                })?;
                for skipped in summary.skipped_trips.iter() {
                    log::warn!(
                        "skipped trip {} of feed {}: {}",
                        skipped.trip_id,
                        skipped.feed_id,
                        skipped.reason
                    );
                }
                write_canonical_feed(&tables, Path::new(output))?;
                print_json(&summary)
            }
            EditorOperation::Snapshot {
                feed_id,
                name,
                comment,
                keep_current,
                store_args,
            } => {
                let store = open_store(store_args)?;
                require_feed(&store, feed_id)?;
                let snapshot = store.snapshot_manager().take_snapshot(
                    feed_id,
                    None,
                    name,
                    comment.as_deref(),
                    !keep_current,
                )?;
                print_json(&snapshot)
            }
            EditorOperation::ListSnapshots {
                feed_id,
                store_args,
            } => {
                let store = open_store(store_args)?;
                let snapshots = store.snapshot_manager().list_snapshots(feed_id)?;
                print_json(&snapshots)
            }
            EditorOperation::Restore {
                feed_id,
                version,
                store_args,
            } => {
                let store = open_store(store_args)?;
                let id = SnapshotId::new(feed_id, *version);
                let stops = store.snapshot_manager().restore(&id)?;
                log::info!("feed {feed_id} now has {} stops", stops.len());
                let snapshot = store.snapshot_manager().get_snapshot(&id)?;
                print_json(&snapshot)
            }
            EditorOperation::MergeStops {
                feed_id,
                stop_ids,
                store_args,
            } => {
                let store = open_store(store_args)?;
                require_feed(&store, feed_id)?;
                let mut tx = store.open_transaction(feed_id)?;
                let summary = ops::merge_stops(&mut tx, stop_ids)?;
                tx.commit()?;
                print_json(&summary)
            }
            EditorOperation::DuplicateStops {
                feed_id,
                tolerance_meters,
                store_args,
            } => {
                if *tolerance_meters < 0.0 {
                    return Err(EditorAppError::InvalidUserInput(format!(
                        "tolerance must not be negative, found {tolerance_meters}"
                    )));
                }
                let store = open_store(store_args)?;
                require_feed(&store, feed_id)?;
                let tx = store.open_read_transaction(feed_id)?;
                let groups = ops::find_duplicate_stops(&tx, *tolerance_meters);
                print_json(&groups)
            }
            EditorOperation::DeleteRoute {
                feed_id,
                route_id,
                store_args,
            } => {
                let store = open_store(store_args)?;
                require_feed(&store, feed_id)?;
                let mut tx = store.open_transaction(feed_id)?;
                let deletion = ops::delete_route(&mut tx, route_id)?;
                tx.commit()?;
                print_json(&serde_json::json!({
                    "route_id": deletion.route.id,
                    "trips_deleted": deletion.trips.len(),
                    "patterns_deleted": deletion.patterns.len(),
                }))
            }
        }
    }
}

/// helper function for reading `FEED_ID` or `FEED_ID:VERSION` arguments in clap
pub fn parse_export_source(s: &str) -> Result<ExportSource, String> {
    match s.split_once(':') {
        None if !s.is_empty() => Ok(ExportSource::live(s)),
        Some((feed_id, version)) if !feed_id.is_empty() => {
            let version = version.parse::<u32>().map_err(|e| {
                format!("failed reading snapshot version in '{s}'. required format: 'FEED_ID:VERSION'. error: {e}")
            })?;
            Ok(ExportSource::snapshot(feed_id, version))
        }
        _ => Err(format!("'{s}' does not name a feed")),
    }
}

fn open_store(store_args: &StoreArgs) -> Result<VersionedDataStore, EditorAppError> {
    let config = store_args.load()?;
    Ok(VersionedDataStore::open(&config.store)?)
}

fn require_feed(store: &VersionedDataStore, feed_id: &str) -> Result<(), EditorAppError> {
    if store.feed_exists(feed_id)? {
        Ok(())
    } else {
        Err(EditorAppError::InvalidUserInput(format!(
            "feed '{feed_id}' does not exist"
        )))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), EditorAppError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| EditorAppError::Internal(format!("failure serializing output: {e}")))?;
    println!("{json}");
    Ok(())
}
