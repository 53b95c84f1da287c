use transit_editor_core::store::StoreError;
use transit_editor_gtfs::GtfsError;

#[derive(thiserror::Error, Debug)]
pub enum EditorAppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Gtfs(#[from] GtfsError),
    #[error("Invalid input: {0}")]
    InvalidUserInput(String),
    #[error("Internal Error: {0}")]
    Internal(String),
}
