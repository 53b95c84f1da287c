//! versioned, transactional storage of editable transit feeds.
//!
//! each feed owns a [`store::TableGroup`] of entity tables plus derived indices.
//! mutations happen inside a [`store::Transaction`] that either commits atomically
//! or rolls back, and the [`store::SnapshotManager`] freezes committed states into
//! numbered snapshots that can later be exported or restored.
pub mod model;
pub mod ops;
pub mod store;
pub mod util;
