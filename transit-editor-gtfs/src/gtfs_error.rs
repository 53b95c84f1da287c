use std::path::PathBuf;

use chrono::NaiveDate;
use itertools::Itertools;
use transit_editor_core::store::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum GtfsError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failure reading GTFS from '{path}': {message}")]
    ReadError { path: PathBuf, message: String },
    #[error("failure writing GTFS to '{path}': {message}")]
    WriteError { path: PathBuf, message: String },
    #[error("GTFS feed is malformed: {0}")]
    MalformedGtfs(String),
    #[error("error due to dataset contents: {0}")]
    InvalidData(String),
    #[error("duplicate schedule exceptions for service '{service_id}' on {date}")]
    DuplicateException { service_id: String, date: NaiveDate },
    #[error("job was cancelled before commit")]
    Cancelled,
    #[error("Internal Error: {0}")]
    Internal(String),
    #[error("errors encountered during batch processing: {0}")]
    BatchProcessing(String),
}

pub fn batch_processing_error(errors: &[GtfsError]) -> GtfsError {
    let concatenated = errors.iter().map(|e| e.to_string()).join("\n  ");
    GtfsError::BatchProcessing(format!("[\n  {concatenated}\n]"))
}
