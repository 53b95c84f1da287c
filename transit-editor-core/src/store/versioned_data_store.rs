use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
};

use super::{
    persistence::{Persistence, SnapshotCatalog},
    slot::Slot,
    GlobalTables, GlobalTransaction, SnapshotManager, StoreConfig, StoreError, TableGroup,
    Transaction,
};
use crate::model::Snapshot;

/// frozen snapshot contents alongside their metadata
#[derive(Debug, Clone)]
pub(crate) struct SnapshotEntry {
    pub meta: Snapshot,
    pub tables: Arc<TableGroup>,
}

#[derive(Debug, Default)]
pub(crate) struct FeedCatalog {
    /// never reset, so versions are never reused even after deletion
    pub next_version: u32,
    pub snapshots: BTreeMap<u32, SnapshotEntry>,
}

impl FeedCatalog {
    pub fn to_persisted(&self) -> SnapshotCatalog {
        SnapshotCatalog {
            next_version: self.next_version,
            snapshots: self.snapshots.values().map(|s| s.meta.clone()).collect(),
        }
    }
}

/// everything the store keeps for one feed.
#[derive(Debug)]
pub(crate) struct FeedSlot {
    pub feed_id: String,
    pub tables: Arc<Slot<TableGroup>>,
    pub catalog: Mutex<FeedCatalog>,
}

impl FeedSlot {
    /// true if the feed holds no rows and has never been snapshotted
    pub fn is_unused(&self, tables: &TableGroup) -> Result<bool, StoreError> {
        let next_version = self
            .catalog
            .lock()
            .map_err(|e| StoreError::poisoned("snapshot catalog", e))?
            .next_version;
        Ok(next_version == 0 && is_empty_group(tables))
    }
}

#[derive(Debug)]
struct StoreInner {
    persistence: Option<Persistence>,
    feeds: Mutex<BTreeMap<String, Arc<FeedSlot>>>,
    global: Arc<Slot<GlobalTables>>,
}

/// entry point for reading and editing feeds.
///
/// each feed has its own committed [`TableGroup`] and its own writer lock, so
/// transactions on different feeds never wait on each other. within a feed, a
/// second writer blocks until the first commits or rolls back. the store is
/// cheap to clone and all clones share state.
#[derive(Debug, Clone)]
pub struct VersionedDataStore {
    inner: Arc<StoreInner>,
}

impl VersionedDataStore {
    /// opens a store. feeds persisted in the data directory are loaded lazily
    /// on first access.
    pub fn open(config: &StoreConfig) -> Result<VersionedDataStore, StoreError> {
        let persistence = config
            .data_directory()
            .map(|dir| Persistence::new(dir, config.pretty_print()));
        let global = match &persistence {
            Some(p) => p.read_global()?.unwrap_or_default(),
            None => GlobalTables::default(),
        };
        if let Some(dir) = config.data_directory() {
            log::info!("opened feed store at {}", dir.display());
        }
        Ok(VersionedDataStore {
            inner: Arc::new(StoreInner {
                persistence,
                feeds: Mutex::new(BTreeMap::new()),
                global: Arc::new(Slot::new("global", global)),
            }),
        })
    }

    /// a store that is never written to disk
    pub fn in_memory() -> VersionedDataStore {
        VersionedDataStore {
            inner: Arc::new(StoreInner {
                persistence: None,
                feeds: Mutex::new(BTreeMap::new()),
                global: Arc::new(Slot::new("global", GlobalTables::default())),
            }),
        }
    }

    pub(crate) fn persistence(&self) -> Option<&Persistence> {
        self.inner.persistence.as_ref()
    }

    pub(crate) fn global_slot(&self) -> &Arc<Slot<GlobalTables>> {
        &self.inner.global
    }

    /// finds or loads the slot for a feed, creating an empty one for new feeds.
    pub(crate) fn feed_slot(&self, feed_id: &str) -> Result<Arc<FeedSlot>, StoreError> {
        validate_feed_id(feed_id)?;
        let mut feeds = self
            .inner
            .feeds
            .lock()
            .map_err(|e| StoreError::poisoned("feed map", e))?;
        if let Some(slot) = feeds.get(feed_id) {
            return Ok(Arc::clone(slot));
        }
        let slot = Arc::new(self.load_feed_slot(feed_id)?);
        feeds.insert(feed_id.to_string(), Arc::clone(&slot));
        Ok(slot)
    }

    fn load_feed_slot(&self, feed_id: &str) -> Result<FeedSlot, StoreError> {
        let mut catalog = FeedCatalog::default();
        let mut tables = TableGroup::default();
        if let Some(p) = self.persistence() {
            if let Some(persisted) = p.read_feed_tables(feed_id)? {
                tables = persisted;
            }
            if let Some(persisted) = p.read_catalog(feed_id)? {
                catalog.next_version = persisted.next_version;
                for meta in persisted.snapshots {
                    let frozen = p.read_snapshot_tables(feed_id, meta.version)?;
                    let entry = SnapshotEntry {
                        meta,
                        tables: Arc::new(frozen),
                    };
                    catalog.snapshots.insert(entry.meta.version, entry);
                }
            }
            log::debug!(
                "loaded feed {feed_id} with {} snapshots from disk",
                catalog.snapshots.len()
            );
        }
        Ok(FeedSlot {
            feed_id: feed_id.to_string(),
            tables: Arc::new(Slot::new(&format!("feed {feed_id}"), tables)),
            catalog: Mutex::new(catalog),
        })
    }

    /// opens a read-write transaction, waiting for any open writer on the feed.
    /// a thread that already holds a writer on this feed must not call this again.
    pub fn open_transaction(&self, feed_id: &str) -> Result<Transaction, StoreError> {
        let slot = self.feed_slot(feed_id)?;
        let (guard, committed) = slot.tables.acquire_writer()?;
        Ok(Transaction::live(self.clone(), feed_id, committed, Some(guard)))
    }

    /// opens a read-write transaction, failing with [`StoreError::Conflict`]
    /// instead of waiting if another writer is open on the feed.
    pub fn try_open_transaction(&self, feed_id: &str) -> Result<Transaction, StoreError> {
        let slot = self.feed_slot(feed_id)?;
        match slot.tables.try_acquire_writer()? {
            Some((guard, committed)) => {
                Ok(Transaction::live(self.clone(), feed_id, committed, Some(guard)))
            }
            None => Err(StoreError::Conflict(format!(
                "another transaction is already writing to feed '{feed_id}'"
            ))),
        }
    }

    /// opens a transaction over the last committed state that cannot commit.
    pub fn open_read_transaction(&self, feed_id: &str) -> Result<Transaction, StoreError> {
        let slot = self.feed_slot(feed_id)?;
        let committed = slot.tables.committed()?;
        Ok(Transaction::live(self.clone(), feed_id, committed, None))
    }

    /// opens a transaction over a frozen snapshot. it may be edited, but only
    /// committed into another feed with [`Transaction::commit_as_feed`].
    pub fn open_snapshot_transaction(
        &self,
        feed_id: &str,
        version: u32,
    ) -> Result<Transaction, StoreError> {
        let slot = self.feed_slot(feed_id)?;
        let catalog = slot
            .catalog
            .lock()
            .map_err(|e| StoreError::poisoned("snapshot catalog", e))?;
        let entry = catalog.snapshots.get(&version).ok_or_else(|| {
            StoreError::NotFound(format!("snapshot {feed_id}:{version} does not exist"))
        })?;
        Ok(Transaction::snapshot(
            self.clone(),
            feed_id,
            version,
            Arc::clone(&entry.tables),
        ))
    }

    /// opens a transaction on the tables shared by all feeds.
    pub fn open_global_transaction(&self) -> Result<GlobalTransaction, StoreError> {
        let (guard, committed) = self.inner.global.acquire_writer()?;
        Ok(GlobalTransaction::new(self.clone(), committed, guard))
    }

    /// last committed global tables
    pub fn global_tables(&self) -> Result<Arc<GlobalTables>, StoreError> {
        self.inner.global.committed()
    }

    /// true if the feed has been registered, committed or persisted
    pub fn feed_exists(&self, feed_id: &str) -> Result<bool, StoreError> {
        Ok(self.feed_ids()?.iter().any(|id| id == feed_id))
    }

    /// ids of all known feeds
    pub fn feed_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: BTreeSet<String> = self.global_tables()?.feeds().keys().map(String::from).collect();
        {
            let feeds = self
                .inner
                .feeds
                .lock()
                .map_err(|e| StoreError::poisoned("feed map", e))?;
            for (feed_id, slot) in feeds.iter() {
                let tables = slot.tables.committed()?;
                if !slot.is_unused(&tables)? {
                    ids.insert(feed_id.clone());
                }
            }
        }
        if let Some(p) = self.persistence() {
            ids.extend(p.list_feed_ids()?);
        }
        Ok(ids.into_iter().collect())
    }

    /// copies the committed contents of a feed into a new feed, returning the new id.
    pub fn duplicate_feed(&self, feed_id: &str) -> Result<String, StoreError> {
        let source = self.open_read_transaction(feed_id)?;
        let new_feed_id = crate::model::new_id();
        let mut target = self.open_transaction(&new_feed_id)?;
        *target = source.with_feed_id(&new_feed_id);
        target.commit()?;
        log::info!("duplicated feed {feed_id} as {new_feed_id}");
        Ok(new_feed_id)
    }

    pub fn snapshot_manager(&self) -> SnapshotManager {
        SnapshotManager::new(self.clone())
    }
}

fn is_empty_group(tables: &TableGroup) -> bool {
    tables.agencies().is_empty()
        && tables.stops().is_empty()
        && tables.routes().is_empty()
        && tables.calendars().is_empty()
        && tables.exceptions().is_empty()
        && tables.trip_patterns().is_empty()
        && tables.trips().is_empty()
        && tables.fares().is_empty()
}

/// feed ids name directories on disk, so they are restricted to a safe alphabet.
fn validate_feed_id(feed_id: &str) -> Result<(), StoreError> {
    let valid = !feed_id.is_empty()
        && !feed_id.starts_with('.')
        && feed_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "feed id '{feed_id}' must be non-empty and contain only letters, digits, '-', '_' or '.'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stop;
    use std::{thread, time::Duration};

    fn add_stop(tx: &mut Transaction, id: &str) {
        let mut stop = Stop::new(tx.feed_id(), id, -105.0, 40.0);
        stop.id = id.to_string();
        tx.stops_mut().put(stop);
    }

    #[test]
    fn test_feed_id_validation() {
        let store = VersionedDataStore::in_memory();
        assert!(store.open_transaction("../escape").is_err());
        assert!(store.open_transaction("").is_err());
        assert!(store.open_transaction("feed_1.v2").is_ok());
    }

    #[test]
    fn test_second_writer_is_rejected_or_waits() {
        let store = VersionedDataStore::in_memory();
        let mut first = store.open_transaction("feed").unwrap();
        match store.try_open_transaction("feed") {
            Err(StoreError::Conflict(_)) => {}
            other => panic!("expected conflict, found {other:?}"),
        }
        // other feeds are independent
        assert!(store.try_open_transaction("other").is_ok());

        let waiting = {
            let store = store.clone();
            thread::spawn(move || {
                let tx = store.open_transaction("feed").unwrap();
                tx.stops().len()
            })
        };
        thread::sleep(Duration::from_millis(20));
        add_stop(&mut first, "a");
        first.commit().unwrap();
        assert_eq!(waiting.join().unwrap(), 1);
    }

    #[test]
    fn test_readers_see_last_commit_while_writer_open() {
        let store = VersionedDataStore::in_memory();
        let mut tx = store.open_transaction("feed").unwrap();
        add_stop(&mut tx, "a");
        tx.commit().unwrap();

        let mut writer = store.open_transaction("feed").unwrap();
        add_stop(&mut writer, "b");
        let reader = store.open_read_transaction("feed").unwrap();
        assert_eq!(reader.stops().len(), 1);
        drop(writer);
    }

    #[test]
    fn test_duplicate_feed() {
        let store = VersionedDataStore::in_memory();
        let mut tx = store.open_transaction("feed").unwrap();
        add_stop(&mut tx, "a");
        tx.commit().unwrap();

        let copy_id = store.duplicate_feed("feed").unwrap();
        let copy = store.open_read_transaction(&copy_id).unwrap();
        let stop = copy.stops().get("a").unwrap();
        assert_eq!(stop.feed_id, copy_id);
        assert!(store.feed_ids().unwrap().contains(&copy_id));
    }

    #[test]
    fn test_feed_ids_skip_untouched_feeds() {
        let store = VersionedDataStore::in_memory();
        let mut tx = store.open_transaction("feed").unwrap();
        add_stop(&mut tx, "a");
        tx.commit().unwrap();
        // opening a feed creates its slot but not the feed
        drop(store.open_read_transaction("ghost").unwrap());
        drop(store.open_transaction("empty").unwrap());
        store
            .snapshot_manager()
            .take_snapshot("snapshotted", None, "s", None, false)
            .unwrap();

        assert_eq!(
            store.feed_ids().unwrap(),
            vec![String::from("feed"), String::from("snapshotted")]
        );
        assert!(!store.feed_exists("ghost").unwrap());
    }
}
