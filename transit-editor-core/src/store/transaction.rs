use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use super::{slot::WriterGuard, GlobalTables, StoreError, TableGroup, VersionedDataStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Open,
    Committed,
    RolledBack,
}

#[derive(Debug)]
enum TxSource {
    /// the live feed. `writer` is None for read-only transactions and after close.
    Live {
        writer: Option<WriterGuard<TableGroup>>,
    },
    /// a frozen snapshot of the feed
    Snapshot { version: u32 },
}

/// a unit of work against one feed's [`TableGroup`].
///
/// the transaction edits a private copy of the tables, available through
/// `Deref`/`DerefMut`. [`Transaction::commit`] publishes the copy and persists
/// it, [`Transaction::rollback`] throws it away. a transaction dropped while
/// open is rolled back, so returning early with `?` never leaves partial edits.
#[derive(Debug)]
pub struct Transaction {
    store: VersionedDataStore,
    feed_id: String,
    source: TxSource,
    base: Arc<TableGroup>,
    working: TableGroup,
    state: TxState,
}

impl Transaction {
    pub(crate) fn live(
        store: VersionedDataStore,
        feed_id: &str,
        committed: Arc<TableGroup>,
        writer: Option<WriterGuard<TableGroup>>,
    ) -> Transaction {
        let working = committed.as_ref().clone();
        Transaction {
            store,
            feed_id: feed_id.to_string(),
            source: TxSource::Live { writer },
            base: committed,
            working,
            state: TxState::Open,
        }
    }

    pub(crate) fn snapshot(
        store: VersionedDataStore,
        feed_id: &str,
        version: u32,
        frozen: Arc<TableGroup>,
    ) -> Transaction {
        let working = frozen.as_ref().clone();
        Transaction {
            store,
            feed_id: feed_id.to_string(),
            source: TxSource::Snapshot { version },
            base: frozen,
            working,
            state: TxState::Open,
        }
    }

    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    pub fn is_open(&self) -> bool {
        self.state == TxState::Open
    }

    /// snapshot version this transaction reads from, if any
    pub fn snapshot_version(&self) -> Option<u32> {
        match self.source {
            TxSource::Snapshot { version } => Some(version),
            TxSource::Live { .. } => None,
        }
    }

    /// true if [`Transaction::commit`] would be refused
    pub fn is_read_only(&self) -> bool {
        match &self.source {
            TxSource::Snapshot { .. } => true,
            TxSource::Live { writer } => writer.is_none(),
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::TransactionClosed(self.feed_id.clone()))
        }
    }

    /// publishes every change made in this transaction, with freshly built
    /// indices, as the feed's committed state. either every table changes or
    /// none do: a failed write to disk rolls the transaction back.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let guard = match &mut self.source {
            TxSource::Snapshot { version } => {
                return Err(StoreError::ReadOnlySnapshot {
                    feed_id: self.feed_id.clone(),
                    version: *version,
                })
            }
            TxSource::Live { writer } => writer.take().ok_or_else(|| {
                StoreError::ReadOnly(format!("feed '{}' was opened for reading", self.feed_id))
            })?,
        };
        self.working.rebuild_indices();
        if let Some(persistence) = self.store.persistence() {
            if let Err(e) = persistence.write_feed_tables(&self.feed_id, &self.working) {
                log::error!("commit to feed {} failed, rolling back: {e}", self.feed_id);
                self.discard();
                return Err(e);
            }
        }
        match guard.publish(self.working.clone()) {
            Ok(committed) => {
                self.base = committed;
                self.state = TxState::Committed;
                log::debug!("committed transaction on feed {}", self.feed_id);
                Ok(())
            }
            Err(e) => {
                self.discard();
                Err(e)
            }
        }
    }

    /// commits the contents of this transaction as the initial state of a new
    /// feed, rewriting the owning feed id of every row. this is the only way to
    /// commit edits made on top of a snapshot. fails with
    /// [`StoreError::Conflict`] if the target feed already holds rows or
    /// snapshots.
    pub fn commit_as_feed(&mut self, feed_id: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        if feed_id == self.feed_id && self.snapshot_version().is_none() {
            return self.commit();
        }
        let slot = self.store.feed_slot(feed_id)?;
        let (guard, committed) = slot.tables.acquire_writer()?;
        if !slot.is_unused(&committed)? {
            return Err(StoreError::Conflict(format!(
                "feed '{feed_id}' already exists, contents of feed '{}' must be committed to a new feed",
                self.feed_id
            )));
        }
        let mut contents = self.working.with_feed_id(feed_id);
        contents.rebuild_indices();
        if let Some(persistence) = self.store.persistence() {
            if let Err(e) = persistence.write_feed_tables(feed_id, &contents) {
                self.discard();
                return Err(e);
            }
        }
        guard.publish(contents)?;
        self.close(TxState::Committed);
        log::info!("committed contents of feed {} into feed {feed_id}", self.feed_id);
        Ok(())
    }

    /// discards every change made in this transaction. calling it again, or
    /// after a commit, does nothing.
    pub fn rollback(&mut self) {
        match self.state {
            TxState::Open => self.discard(),
            TxState::RolledBack => {}
            TxState::Committed => {
                log::debug!(
                    "ignoring rollback of already committed transaction on feed {}",
                    self.feed_id
                )
            }
        }
    }

    /// rolls back only if the transaction has not been committed or rolled back.
    pub fn rollback_if_open(&mut self) {
        if self.is_open() {
            self.discard();
        }
    }

    fn discard(&mut self) {
        self.working = self.base.as_ref().clone();
        self.close(TxState::RolledBack);
    }

    fn close(&mut self, state: TxState) {
        self.state = state;
        if let TxSource::Live { writer } = &mut self.source {
            // releases the feed for the next writer
            writer.take();
        }
    }
}

impl Deref for Transaction {
    type Target = TableGroup;

    fn deref(&self) -> &Self::Target {
        &self.working
    }
}

impl DerefMut for Transaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.working
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_open() {
            if !self.is_read_only() {
                log::debug!("rolling back open transaction on feed {}", self.feed_id);
            }
            self.discard();
        }
    }
}

/// a unit of work against the [`GlobalTables`] shared by all feeds.
#[derive(Debug)]
pub struct GlobalTransaction {
    store: VersionedDataStore,
    writer: Option<WriterGuard<GlobalTables>>,
    base: Arc<GlobalTables>,
    working: GlobalTables,
    state: TxState,
}

impl GlobalTransaction {
    pub(crate) fn new(
        store: VersionedDataStore,
        committed: Arc<GlobalTables>,
        writer: WriterGuard<GlobalTables>,
    ) -> GlobalTransaction {
        let working = committed.as_ref().clone();
        GlobalTransaction {
            store,
            writer: Some(writer),
            base: committed,
            working,
            state: TxState::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == TxState::Open
    }

    pub fn commit(&mut self) -> Result<(), StoreError> {
        if !self.is_open() {
            return Err(StoreError::TransactionClosed(String::from("global")));
        }
        let guard = self
            .writer
            .take()
            .ok_or_else(|| StoreError::Internal(String::from("global writer missing")))?;
        if let Some(persistence) = self.store.persistence() {
            if let Err(e) = persistence.write_global(&self.working) {
                self.discard();
                return Err(e);
            }
        }
        match guard.publish(self.working.clone()) {
            Ok(committed) => {
                self.base = committed;
                self.state = TxState::Committed;
                Ok(())
            }
            Err(e) => {
                self.discard();
                Err(e)
            }
        }
    }

    pub fn rollback(&mut self) {
        if self.is_open() {
            self.discard();
        }
    }

    pub fn rollback_if_open(&mut self) {
        self.rollback();
    }

    fn discard(&mut self) {
        self.working = self.base.as_ref().clone();
        self.state = TxState::RolledBack;
        self.writer.take();
    }
}

impl Deref for GlobalTransaction {
    type Target = GlobalTables;

    fn deref(&self) -> &Self::Target {
        &self.working
    }
}

impl DerefMut for GlobalTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.working
    }
}

impl Drop for GlobalTransaction {
    fn drop(&mut self) {
        if self.is_open() {
            self.discard();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Route, ServiceCalendar, Stop, Trip, TripPattern, TripPatternStop};
    use crate::store::StoreConfig;
    use chrono::NaiveDate;

    fn stop(feed_id: &str, id: &str) -> Stop {
        let mut stop = Stop::new(feed_id, id, -105.0, 40.0);
        stop.id = id.to_string();
        stop
    }

    fn populated_store() -> VersionedDataStore {
        let store = VersionedDataStore::in_memory();
        let mut tx = store.open_transaction("feed").unwrap();
        tx.stops_mut().put(stop("feed", "a"));
        tx.stops_mut().put(stop("feed", "b"));
        let mut route = Route::new("feed", "1", crate::model::GtfsRouteType::Bus);
        route.id = String::from("r1");
        tx.routes_mut().put(route);
        let mut pattern = TripPattern::new("feed", "r1", "p");
        pattern.id = String::from("p1");
        pattern.pattern_stops = vec![TripPatternStop::new("a"), TripPatternStop::new("b")];
        tx.trip_patterns_mut().put(pattern);
        let mut cal = ServiceCalendar::new(
            "feed",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        );
        cal.id = String::from("c1");
        tx.calendars_mut().put(cal);
        let mut trip = Trip::new("feed", "r1", "p1", "c1");
        trip.id = String::from("t1");
        tx.trips_mut().put(trip);
        tx.commit().unwrap();
        store
    }

    #[test]
    fn test_rollback_leaves_no_trace() {
        let store = populated_store();
        let before = store.open_read_transaction("feed").unwrap();
        let before_json = serde_json::to_string(&*before).unwrap();

        let mut tx = store.open_transaction("feed").unwrap();
        tx.stops_mut().remove("a");
        tx.stops_mut().put(stop("feed", "c"));
        tx.trips_mut().remove("t1");
        tx.rollback();
        assert!(tx.stops().contains_key("a"));
        drop(tx);

        let after = store.open_read_transaction("feed").unwrap();
        assert_eq!(serde_json::to_string(&*after).unwrap(), before_json);
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = populated_store();
        {
            let mut tx = store.open_transaction("feed").unwrap();
            tx.stops_mut().remove("a");
        }
        let tx = store.open_read_transaction("feed").unwrap();
        assert!(tx.stops().contains_key("a"));
    }

    #[test]
    fn test_commit_updates_tables_and_indices() {
        let store = populated_store();
        let mut tx = store.open_transaction("feed").unwrap();
        let mut trip = Trip::new("feed", "r1", "p1", "c1");
        trip.id = String::from("t2");
        tx.trips_mut().put(trip);
        tx.commit().unwrap();

        let fresh = store.open_read_transaction("feed").unwrap();
        assert_eq!(fresh.trips().len(), 2);
        assert_eq!(fresh.indices().trips_by_route("r1"), vec!["t1", "t2"]);
        assert_eq!(fresh.indices().trips_by_pattern("p1"), vec!["t1", "t2"]);
        assert_eq!(fresh.indices().trip_count_by_calendar("c1"), 2);
        assert_eq!(
            fresh.indices().trip_count_by_pattern_and_calendar("p1", "c1"),
            2
        );
        assert_eq!(fresh.indices().patterns_by_stop("a"), vec!["p1"]);
    }

    #[test]
    fn test_rollback_is_idempotent_after_commit() {
        let store = populated_store();
        let mut tx = store.open_transaction("feed").unwrap();
        tx.stops_mut().put(stop("feed", "c"));
        tx.commit().unwrap();
        tx.rollback_if_open();
        tx.rollback();
        tx.rollback();
        assert!(!tx.is_open());
        assert!(matches!(tx.commit(), Err(StoreError::TransactionClosed(_))));
        let fresh = store.open_read_transaction("feed").unwrap();
        assert!(fresh.stops().contains_key("c"));
    }

    #[test]
    fn test_read_transaction_cannot_commit() {
        let store = populated_store();
        let mut tx = store.open_read_transaction("feed").unwrap();
        assert!(tx.is_read_only());
        assert!(matches!(tx.commit(), Err(StoreError::ReadOnly(_))));
    }

    #[test]
    fn test_commit_persists_and_reloads() {
        let dir = std::env::temp_dir().join(format!("transit-editor-tx-{}", crate::model::new_id()));
        let config = StoreConfig::with_directory(dir.to_str().unwrap());
        {
            let store = VersionedDataStore::open(&config).unwrap();
            let mut tx = store.open_transaction("feed").unwrap();
            tx.stops_mut().put(stop("feed", "a"));
            tx.commit().unwrap();
        }
        let reopened = VersionedDataStore::open(&config).unwrap();
        let tx = reopened.open_read_transaction("feed").unwrap();
        assert!(tx.stops().contains_key("a"));
        assert_eq!(reopened.feed_ids().unwrap(), vec![String::from("feed")]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_commit_as_existing_feed_is_refused() {
        let store = populated_store();
        let mut other = store.open_transaction("other").unwrap();
        other.stops_mut().put(stop("other", "keep_me"));
        other.commit().unwrap();
        drop(other);
        let snapshot = store
            .snapshot_manager()
            .take_snapshot("feed", None, "before", None, false)
            .unwrap();

        let mut tx = store
            .open_snapshot_transaction("feed", snapshot.version)
            .unwrap();
        assert!(matches!(
            tx.commit_as_feed("other"),
            Err(StoreError::Conflict(_))
        ));
        let mut tx = store
            .open_snapshot_transaction("feed", snapshot.version)
            .unwrap();
        assert!(matches!(
            tx.commit_as_feed("feed"),
            Err(StoreError::Conflict(_))
        ));
        assert!(tx.is_open());
        tx.commit_as_feed("fresh").unwrap();

        let other = store.open_read_transaction("other").unwrap();
        assert!(other.stops().contains_key("keep_me"));
        assert_eq!(other.stops().len(), 1);
        let fresh = store.open_read_transaction("fresh").unwrap();
        assert!(fresh.stops().contains_key("a"));
    }

    #[test]
    fn test_global_transaction() {
        let store = VersionedDataStore::in_memory();
        let mut tx = store.open_global_transaction().unwrap();
        tx.feeds_mut().put(crate::model::EditorFeed::new("feed"));
        tx.commit().unwrap();
        assert!(store.feed_exists("feed").unwrap());
        let mut tx = store.open_global_transaction().unwrap();
        tx.feeds_mut().remove("feed");
        tx.rollback();
        assert!(store.global_tables().unwrap().feeds().contains_key("feed"));
    }
}
