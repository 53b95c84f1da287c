mod indices;
mod persistence;
mod slot;
mod snapshot_manager;
mod store_config;
mod store_error;
mod table;
mod table_group;
mod transaction;
mod versioned_data_store;

pub use indices::{CompositeKey, Indices};
pub use snapshot_manager::SnapshotManager;
pub use store_config::StoreConfig;
pub use store_error::{ErrorKind, StoreError};
pub use table::Table;
pub use table_group::{GlobalTables, TableGroup};
pub use transaction::{GlobalTransaction, Transaction};
pub use versioned_data_store::VersionedDataStore;
