use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{GlobalTables, StoreError, TableGroup};
use crate::model::Snapshot;

const GLOBAL_FILENAME: &str = "global.json";
const FEEDS_DIRECTORY: &str = "feeds";
const MASTER_FILENAME: &str = "master.json";
const CATALOG_FILENAME: &str = "snapshots.json";
const SNAPSHOTS_DIRECTORY: &str = "snapshots";

/// on-disk record of a feed's snapshots and its version counter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct SnapshotCatalog {
    pub next_version: u32,
    pub snapshots: Vec<Snapshot>,
}

/// JSON file layout of a store:
///
/// ```text
/// <root>/global.json
/// <root>/feeds/<feed_id>/master.json
/// <root>/feeds/<feed_id>/snapshots.json
/// <root>/feeds/<feed_id>/snapshots/<version>.json
/// ```
#[derive(Debug, Clone)]
pub(crate) struct Persistence {
    root: PathBuf,
    pretty: bool,
}

impl Persistence {
    pub fn new(root: PathBuf, pretty: bool) -> Persistence {
        Persistence { root, pretty }
    }

    fn feed_directory(&self, feed_id: &str) -> PathBuf {
        self.root.join(FEEDS_DIRECTORY).join(feed_id)
    }

    fn snapshot_path(&self, feed_id: &str, version: u32) -> PathBuf {
        self.feed_directory(feed_id)
            .join(SNAPSHOTS_DIRECTORY)
            .join(format!("{version}.json"))
    }

    pub fn read_global(&self) -> Result<Option<GlobalTables>, StoreError> {
        read_json(&self.root.join(GLOBAL_FILENAME))
    }

    pub fn write_global(&self, tables: &GlobalTables) -> Result<(), StoreError> {
        write_json(&self.root.join(GLOBAL_FILENAME), tables, self.pretty)
    }

    pub fn feed_exists(&self, feed_id: &str) -> bool {
        self.feed_directory(feed_id).join(MASTER_FILENAME).is_file()
    }

    pub fn read_feed_tables(&self, feed_id: &str) -> Result<Option<TableGroup>, StoreError> {
        read_json(&self.feed_directory(feed_id).join(MASTER_FILENAME))
    }

    pub fn write_feed_tables(&self, feed_id: &str, tables: &TableGroup) -> Result<(), StoreError> {
        let path = self.feed_directory(feed_id).join(MASTER_FILENAME);
        write_json(&path, tables, self.pretty)
    }

    pub fn read_catalog(&self, feed_id: &str) -> Result<Option<SnapshotCatalog>, StoreError> {
        read_json(&self.feed_directory(feed_id).join(CATALOG_FILENAME))
    }

    pub fn write_catalog(&self, feed_id: &str, catalog: &SnapshotCatalog) -> Result<(), StoreError> {
        let path = self.feed_directory(feed_id).join(CATALOG_FILENAME);
        write_json(&path, catalog, self.pretty)
    }

    pub fn read_snapshot_tables(&self, feed_id: &str, version: u32) -> Result<TableGroup, StoreError> {
        let path = self.snapshot_path(feed_id, version);
        read_json(&path)?.ok_or_else(|| StoreError::Storage {
            path,
            message: format!("snapshot {feed_id}:{version} is listed but its tables are missing"),
        })
    }

    pub fn write_snapshot_tables(
        &self,
        feed_id: &str,
        version: u32,
        tables: &TableGroup,
    ) -> Result<(), StoreError> {
        write_json(&self.snapshot_path(feed_id, version), tables, self.pretty)
    }

    pub fn remove_snapshot_tables(&self, feed_id: &str, version: u32) -> Result<(), StoreError> {
        let path = self.snapshot_path(feed_id, version);
        if !path.exists() {
            return Ok(());
        }
        std::fs::remove_file(&path).map_err(|e| StoreError::Storage {
            path,
            message: format!("unable to remove snapshot file: {e}"),
        })
    }

    /// ids of all feeds with a persisted master file
    pub fn list_feed_ids(&self) -> Result<Vec<String>, StoreError> {
        let directory = self.root.join(FEEDS_DIRECTORY);
        if !directory.is_dir() {
            return Ok(vec![]);
        }
        let entries = directory
            .read_dir()
            .map_err(|e| StoreError::Storage {
                path: directory.clone(),
                message: format!("failure reading directory: {e}"),
            })?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Storage {
                path: directory.clone(),
                message: format!("failure reading directory: {e}"),
            })?;
        let mut feed_ids: Vec<String> = entries
            .into_iter()
            .filter_map(|entry| entry.file_name().to_str().map(String::from))
            .filter(|feed_id| self.feed_exists(feed_id))
            .collect();
        feed_ids.sort();
        Ok(feed_ids)
    }
}

/// helper function to "mkdir -p path" - make all directories along a path
fn create_dirs(path: &Path) -> Result<(), StoreError> {
    if path.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(|e| StoreError::Storage {
        path: path.to_path_buf(),
        message: format!("error building directory: {e}"),
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.is_file() {
        return Ok(None);
    }
    let file = File::open(path).map_err(|e| StoreError::Storage {
        path: path.to_path_buf(),
        message: format!("unable to open file: {e}"),
    })?;
    let value = serde_json::from_reader(BufReader::new(file)).map_err(|e| StoreError::Storage {
        path: path.to_path_buf(),
        message: format!("unable to deserialize file contents: {e}"),
    })?;
    Ok(Some(value))
}

/// writes to a sibling temp file and renames it over `path`, so readers only
/// ever see a complete file.
fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| StoreError::Storage {
        path: path.to_path_buf(),
        message: String::from("path has no parent directory"),
    })?;
    create_dirs(parent)?;
    let tmp_path = path.with_extension("json.tmp");
    let storage_error = |e: String| StoreError::Storage {
        path: tmp_path.clone(),
        message: e,
    };
    let file = File::create(&tmp_path)
        .map_err(|e| storage_error(format!("unable to create file: {e}")))?;
    let mut writer = BufWriter::new(file);
    let result = if pretty {
        serde_json::to_writer_pretty(&mut writer, value)
    } else {
        serde_json::to_writer(&mut writer, value)
    };
    result.map_err(|e| storage_error(format!("unable to serialize: {e}")))?;
    writer
        .flush()
        .map_err(|e| storage_error(format!("unable to flush: {e}")))?;
    std::fs::rename(&tmp_path, path).map_err(|e| StoreError::Storage {
        path: path.to_path_buf(),
        message: format!("unable to move temp file into place: {e}"),
    })
}
