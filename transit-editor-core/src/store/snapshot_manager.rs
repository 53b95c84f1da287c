use std::sync::Arc;

use chrono::Utc;

use super::{
    versioned_data_store::{FeedCatalog, SnapshotEntry},
    StoreError, TableGroup, VersionedDataStore,
};
use crate::model::{Snapshot, SnapshotId, Stop};

/// creates, lists and restores the frozen snapshots of feeds.
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    store: VersionedDataStore,
}

impl SnapshotManager {
    pub fn new(store: VersionedDataStore) -> SnapshotManager {
        SnapshotManager { store }
    }

    /// freezes the committed state of a feed under the next version number.
    ///
    /// # Arguments
    ///
    /// * `feed_id` - feed to snapshot
    /// * `source_version_ref` - published feed version the contents came from, if any
    /// * `name` - user-facing name of the snapshot
    /// * `comment` - optional description
    /// * `make_current` - mark this snapshot current and every other snapshot not current
    ///
    /// # Returns
    ///
    /// * metadata of the new snapshot
    pub fn take_snapshot(
        &self,
        feed_id: &str,
        source_version_ref: Option<&str>,
        name: &str,
        comment: Option<&str>,
        make_current: bool,
    ) -> Result<Snapshot, StoreError> {
        let slot = self.store.feed_slot(feed_id)?;
        let tables = slot.tables.committed()?;
        let mut catalog = slot
            .catalog
            .lock()
            .map_err(|e| StoreError::poisoned("snapshot catalog", e))?;

        let version = catalog.next_version;
        let (valid_from, valid_to) = validity_window(&tables);
        let snapshot = Snapshot {
            feed_id: feed_id.to_string(),
            version,
            name: name.to_string(),
            comment: comment.map(String::from),
            current: make_current,
            feed_version_id: source_version_ref.map(String::from),
            snapshot_time: Utc::now(),
            valid_from,
            valid_to,
        };

        let mut updated = FeedCatalog {
            next_version: version + 1,
            snapshots: catalog.snapshots.clone(),
        };
        if make_current {
            set_current(&mut updated, None);
        }
        updated.snapshots.insert(
            version,
            SnapshotEntry {
                meta: snapshot.clone(),
                tables: Arc::clone(&tables),
            },
        );

        if let Some(p) = self.store.persistence() {
            p.write_snapshot_tables(feed_id, version, &tables)?;
            p.write_catalog(feed_id, &updated.to_persisted())?;
        }
        *catalog = updated;
        log::info!("took snapshot {} '{name}'", snapshot.id());
        Ok(snapshot)
    }

    /// snapshots of a feed in version order
    pub fn list_snapshots(&self, feed_id: &str) -> Result<Vec<Snapshot>, StoreError> {
        let slot = self.store.feed_slot(feed_id)?;
        let catalog = slot
            .catalog
            .lock()
            .map_err(|e| StoreError::poisoned("snapshot catalog", e))?;
        Ok(catalog.snapshots.values().map(|s| s.meta.clone()).collect())
    }

    pub fn get_snapshot(&self, id: &SnapshotId) -> Result<Snapshot, StoreError> {
        self.list_snapshots(&id.feed_id)?
            .into_iter()
            .find(|s| s.version == id.version)
            .ok_or_else(|| StoreError::NotFound(format!("snapshot {id} does not exist")))
    }

    pub fn current_snapshot(&self, feed_id: &str) -> Result<Option<Snapshot>, StoreError> {
        Ok(self
            .list_snapshots(feed_id)?
            .into_iter()
            .find(|s| s.current))
    }

    /// clears the current flag of every snapshot of the feed except `except_version`.
    pub fn deactivate_snapshots(
        &self,
        feed_id: &str,
        except_version: Option<u32>,
    ) -> Result<(), StoreError> {
        let slot = self.store.feed_slot(feed_id)?;
        let mut catalog = slot
            .catalog
            .lock()
            .map_err(|e| StoreError::poisoned("snapshot catalog", e))?;
        let mut updated = FeedCatalog {
            next_version: catalog.next_version,
            snapshots: catalog.snapshots.clone(),
        };
        for entry in updated.snapshots.values_mut() {
            if Some(entry.meta.version) != except_version {
                entry.meta.current = false;
            }
        }
        if let Some(p) = self.store.persistence() {
            p.write_catalog(feed_id, &updated.to_persisted())?;
        }
        *catalog = updated;
        Ok(())
    }

    /// replaces the live state of the snapshot's feed with the snapshot contents,
    /// marks the snapshot current and all of its siblings not current. waits for
    /// any open writer on the feed.
    ///
    /// # Returns
    ///
    /// * the stops of the restored state
    pub fn restore(&self, id: &SnapshotId) -> Result<Vec<Stop>, StoreError> {
        let slot = self.store.feed_slot(&id.feed_id)?;
        let frozen = {
            let catalog = slot
                .catalog
                .lock()
                .map_err(|e| StoreError::poisoned("snapshot catalog", e))?;
            match catalog.snapshots.get(&id.version) {
                Some(entry) if entry.meta.feed_id == id.feed_id => Arc::clone(&entry.tables),
                _ => {
                    return Err(StoreError::NotFound(format!(
                        "snapshot {id} does not exist"
                    )))
                }
            }
        };

        let (guard, _) = slot.tables.acquire_writer()?;
        let mut restored = frozen.as_ref().clone();
        restored.rebuild_indices();
        if let Some(p) = self.store.persistence() {
            p.write_feed_tables(&id.feed_id, &restored)?;
        }
        let live = guard.publish(restored)?;
        drop(guard);

        self.mark_current(&slot.feed_id, id.version)?;
        log::info!("restored snapshot {id}");
        Ok(live.stops().values().cloned().collect())
    }

    fn mark_current(&self, feed_id: &str, version: u32) -> Result<(), StoreError> {
        let slot = self.store.feed_slot(feed_id)?;
        let mut catalog = slot
            .catalog
            .lock()
            .map_err(|e| StoreError::poisoned("snapshot catalog", e))?;
        let mut updated = FeedCatalog {
            next_version: catalog.next_version,
            snapshots: catalog.snapshots.clone(),
        };
        set_current(&mut updated, Some(version));
        if let Some(p) = self.store.persistence() {
            p.write_catalog(feed_id, &updated.to_persisted())?;
        }
        *catalog = updated;
        Ok(())
    }

    /// removes a snapshot. its version number is not reused.
    pub fn delete_snapshot(&self, id: &SnapshotId) -> Result<Snapshot, StoreError> {
        let slot = self.store.feed_slot(&id.feed_id)?;
        let mut catalog = slot
            .catalog
            .lock()
            .map_err(|e| StoreError::poisoned("snapshot catalog", e))?;
        let mut updated = FeedCatalog {
            next_version: catalog.next_version,
            snapshots: catalog.snapshots.clone(),
        };
        let removed = updated
            .snapshots
            .remove(&id.version)
            .ok_or_else(|| StoreError::NotFound(format!("snapshot {id} does not exist")))?;
        if let Some(p) = self.store.persistence() {
            p.write_catalog(&id.feed_id, &updated.to_persisted())?;
            p.remove_snapshot_tables(&id.feed_id, id.version)?;
        }
        *catalog = updated;
        log::info!("deleted snapshot {id}");
        Ok(removed.meta)
    }
}

/// marks only `version` current, or none when `version` is None
fn set_current(catalog: &mut FeedCatalog, version: Option<u32>) {
    for entry in catalog.snapshots.values_mut() {
        entry.meta.current = Some(entry.meta.version) == version;
    }
}

/// earliest calendar start and latest calendar end
fn validity_window(
    tables: &TableGroup,
) -> (Option<chrono::NaiveDate>, Option<chrono::NaiveDate>) {
    let valid_from = tables.calendars().values().map(|c| c.start_date).min();
    let valid_to = tables.calendars().values().map(|c| c.end_date).max();
    (valid_from, valid_to)
}
