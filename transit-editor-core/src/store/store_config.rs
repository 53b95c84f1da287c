use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// settings for a [`super::VersionedDataStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// directory holding persisted feeds and snapshots. if not provided,
    /// the store lives in memory only.
    pub data_directory: Option<String>,
    /// write indented JSON files. defaults to false.
    pub pretty_print: Option<bool>,
}

impl StoreConfig {
    pub fn in_memory() -> StoreConfig {
        StoreConfig::default()
    }

    pub fn with_directory(data_directory: &str) -> StoreConfig {
        StoreConfig {
            data_directory: Some(data_directory.to_string()),
            pretty_print: None,
        }
    }

    pub fn data_directory(&self) -> Option<PathBuf> {
        self.data_directory.as_ref().map(PathBuf::from)
    }

    pub fn pretty_print(&self) -> bool {
        self.pretty_print.unwrap_or(false)
    }
}
