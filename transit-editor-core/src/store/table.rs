use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::StoreError;
use crate::model::Entity;

/// an ordered map of entities keyed by id.
///
/// rows are shared between the committed state, snapshots and open transactions.
/// the first write through a clone copies the map, and each write replaces the
/// whole row, so edits never leak into other copies of the table.
#[derive(Debug)]
pub struct Table<T> {
    rows: Arc<BTreeMap<String, Arc<T>>>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Table {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Table {
            rows: Arc::new(BTreeMap::new()),
        }
    }
}

impl<T: Entity> Table<T> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_key(&self, id: &str) -> bool {
        self.rows.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.rows.get(id).map(|row| row.as_ref())
    }

    /// like [`Table::get`] but reports a missing row as [`StoreError::EntityNotFound`]
    pub fn try_get(&self, id: &str) -> Result<&T, StoreError> {
        self.get(id)
            .ok_or_else(|| StoreError::entity_not_found::<T>(id))
    }

    /// owned copy of a row, for editing and writing back with [`Table::put`]
    pub fn get_cloned(&self, id: &str) -> Option<T> {
        self.get(id).cloned()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values().map(|row| row.as_ref())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(|k| k.as_str())
    }

    /// inserts or replaces a row, returning the previous value.
    pub fn put(&mut self, entity: T) -> Option<Arc<T>> {
        let key = entity.id().to_string();
        Arc::make_mut(&mut self.rows).insert(key, Arc::new(entity))
    }

    /// inserts a new row, failing with [`StoreError::Conflict`] if the id is taken.
    pub fn insert_new(&mut self, entity: T) -> Result<(), StoreError> {
        if self.contains_key(entity.id()) {
            return Err(StoreError::Conflict(format!(
                "{} entity with id '{}' already exists",
                T::TABLE,
                entity.id()
            )));
        }
        self.put(entity);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<T>> {
        if !self.rows.contains_key(id) {
            return None;
        }
        Arc::make_mut(&mut self.rows).remove(id)
    }

    pub fn clear(&mut self) {
        if !self.rows.is_empty() {
            self.rows = Arc::new(BTreeMap::new());
        }
    }

    /// true when both tables share the same underlying rows
    pub fn ptr_eq(&self, other: &Table<T>) -> bool {
        Arc::ptr_eq(&self.rows, &other.rows)
    }
}

impl<T: Entity + PartialEq> PartialEq for Table<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.rows == other.rows
    }
}

impl<T: Entity> FromIterator<T> for Table<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let rows = iter
            .into_iter()
            .map(|e| (e.id().to_string(), Arc::new(e)))
            .collect();
        Table {
            rows: Arc::new(rows),
        }
    }
}

// tables persist as a plain list of rows, ordered by id
impl<T: Entity + Serialize> Serialize for Table<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.values())
    }
}

impl<'de, T: Entity + Deserialize<'de>> Deserialize<'de> for Table<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows: Vec<T> = Vec::deserialize(deserializer)?;
        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stop;

    fn stop(id: &str) -> Stop {
        let mut stop = Stop::new("feed", id, 0.0, 0.0);
        stop.id = id.to_string();
        stop
    }

    #[test]
    fn test_clone_is_isolated_from_writes() {
        let mut original: Table<Stop> = vec![stop("a"), stop("b")].into_iter().collect();
        let copy = original.clone();
        assert!(original.ptr_eq(&copy));

        let mut renamed = original.get_cloned("a").unwrap();
        renamed.stop_name = String::from("renamed");
        original.put(renamed);
        original.remove("b");

        assert!(!original.ptr_eq(&copy));
        assert_eq!(copy.get("a").unwrap().stop_name, "a");
        assert!(copy.contains_key("b"));
        assert_eq!(original.get("a").unwrap().stop_name, "renamed");
        assert!(!original.contains_key("b"));
    }

    #[test]
    fn test_insert_new_conflict() {
        let mut table: Table<Stop> = Table::default();
        assert!(table.insert_new(stop("a")).is_ok());
        match table.insert_new(stop("a")) {
            Err(StoreError::Conflict(msg)) => assert!(msg.contains("already exists")),
            other => panic!("expected conflict, found {other:?}"),
        }
    }

    #[test]
    fn test_remove_missing_does_not_copy() {
        let mut table: Table<Stop> = vec![stop("a")].into_iter().collect();
        let copy = table.clone();
        assert!(table.remove("zzz").is_none());
        assert!(table.ptr_eq(&copy));
    }

    #[test]
    fn test_serde_as_list() {
        let table: Table<Stop> = vec![stop("b"), stop("a")].into_iter().collect();
        let json = serde_json::to_value(&table).unwrap();
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], "a");
        let back: Table<Stop> = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }
}
