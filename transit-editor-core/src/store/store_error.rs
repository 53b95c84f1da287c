use std::path::PathBuf;

/// broad failure classes reported to callers of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    ValidationFailure,
    ConsistencyViolation,
    StorageFailure,
    Internal,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{table} entity with id '{id}' not found")]
    EntityNotFound { table: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),
    #[error("transaction is read-only: {0}")]
    ReadOnly(String),
    #[error("snapshot {feed_id}:{version} is frozen, commit its contents to a new feed instead")]
    ReadOnlySnapshot { feed_id: String, version: u32 },
    #[error("transaction on feed '{0}' is already closed")]
    TransactionClosed(String),
    #[error("storage failure at '{path}': {message}")]
    Storage { path: PathBuf, message: String },
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) | StoreError::EntityNotFound { .. } => ErrorKind::NotFound,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::Validation(_)
            | StoreError::ReadOnly(_)
            | StoreError::ReadOnlySnapshot { .. }
            | StoreError::TransactionClosed(_) => ErrorKind::ValidationFailure,
            StoreError::ConsistencyViolation(_) => ErrorKind::ConsistencyViolation,
            StoreError::Storage { .. } => ErrorKind::StorageFailure,
            StoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn entity_not_found<T: crate::model::Entity>(id: &str) -> StoreError {
        StoreError::EntityNotFound {
            table: T::TABLE,
            id: id.to_string(),
        }
    }

    pub(crate) fn poisoned<E: std::fmt::Display>(what: &str, e: E) -> StoreError {
        StoreError::Internal(format!("{what} lock poisoned: {e}"))
    }
}
