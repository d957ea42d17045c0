//! RecordStore - transactional local storage for records.
//!
//! The store is the system of record while offline. It is independent of
//! connectivity and auth state: a create or update here never fails because
//! the remote side is unreachable. Each operation is a single atomic step;
//! no cross-operation transactions exist, and reconciliation correctness
//! comes from idempotent remote upserts rather than transactional scope
//! spanning network calls.

use crate::{error::Result, Error, Fields, Record, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle to a record store.
///
/// Collaborators (e.g. a rendering layer) may read the store concurrently
/// with an in-flight reconciliation; a read may observe a partially pulled
/// data set. That weak consistency is accepted by design.
pub type SharedStore = Arc<RwLock<RecordStore>>;

/// Durable local storage for [`Record`]s with CRUD semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStore {
    records: BTreeMap<RecordId, Record>,
    next_id: RecordId,
}

impl RecordStore {
    /// Create an empty store. Ids start at 1.
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Wrap a new store in a shared handle.
    pub fn new_shared() -> SharedStore {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Persist a new record, assigning the next surrogate id.
    ///
    /// Ids are monotonically increasing and never reused within a store
    /// lifetime, including after deletes.
    pub fn create(&mut self, fields: Fields) -> RecordId {
        let id = self.next_id;
        self.next_id += 1;
        self.records.insert(id, Record::with_id(id, fields));
        id
    }

    /// Overwrite all fields of an existing record.
    pub fn update(&mut self, id: RecordId, fields: Fields) -> Result<RecordId> {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.fields = fields;
                Ok(id)
            }
            None => Err(Error::NotFound(id)),
        }
    }

    /// Update-or-create under a known id.
    ///
    /// Used by pull: the remote copy may reference a record the local store
    /// has never seen, so a strict update would be wrong there. Keeps
    /// `next_id` ahead of any id written this way.
    pub fn upsert(&mut self, id: RecordId, fields: Fields) -> RecordId {
        self.records.insert(id, Record::with_id(id, fields));
        if id >= self.next_id {
            self.next_id = id + 1;
        }
        id
    }

    /// Get a record by id.
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    /// All records. Callers sort as needed; the store guarantees no
    /// particular domain ordering.
    pub fn list(&self) -> Vec<Record> {
        self.records.values().cloned().collect()
    }

    /// Delete a record by id.
    pub fn delete(&mut self, id: RecordId) -> Result<()> {
        match self.records.remove(&id) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(id)),
        }
    }

    /// Empty the store. Id assignment continues from where it left off, so
    /// records created after a clear never collide with remote documents
    /// written before it.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Number of stored records. Collaborators use this to decide whether
    /// the store needs seeding.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Check if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn next_id(&self) -> RecordId {
        self.next_id
    }

    pub(crate) fn restore(records: BTreeMap<RecordId, Record>, next_id: RecordId) -> Self {
        Self { records, next_id }
    }

    pub(crate) fn records(&self) -> &BTreeMap<RecordId, Record> {
        &self.records
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        Record::fields_from(value)
    }

    #[test]
    fn create_assigns_monotonic_ids() {
        let mut store = RecordStore::new();

        let a = store.create(fields(json!({"topic": "Intro"})));
        let b = store.create(fields(json!({"topic": "Hardware"})));

        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut store = RecordStore::new();

        let a = store.create(fields(json!({"topic": "Intro"})));
        store.delete(a).unwrap();
        let b = store.create(fields(json!({"topic": "Hardware"})));

        assert_ne!(a, b);
    }

    #[test]
    fn update_overwrites_all_fields() {
        let mut store = RecordStore::new();
        let id = store.create(fields(json!({"topic": "Intro", "week": 1})));

        store.update(id, fields(json!({"topic": "Intro v2"}))).unwrap();

        let record = store.get(id).unwrap();
        assert_eq!(record.fields.get("topic"), Some(&json!("Intro v2")));
        assert!(record.fields.get("week").is_none());
    }

    #[test]
    fn update_missing_record() {
        let mut store = RecordStore::new();
        let result = store.update(99, fields(json!({"topic": "Ghost"})));
        assert_eq!(result, Err(Error::NotFound(99)));
    }

    #[test]
    fn upsert_creates_when_absent() {
        let mut store = RecordStore::new();

        store.upsert(5, fields(json!({"topic": "Pulled"})));

        assert_eq!(store.get(5).unwrap().id, Some(5));
        // Next create must not collide with the upserted id.
        let next = store.create(fields(json!({"topic": "Fresh"})));
        assert_eq!(next, 6);
    }

    #[test]
    fn upsert_overwrites_when_present() {
        let mut store = RecordStore::new();
        let id = store.create(fields(json!({"topic": "Old"})));

        store.upsert(id, fields(json!({"topic": "New"})));

        assert_eq!(store.get(id).unwrap().fields.get("topic"), Some(&json!("New")));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn delete_missing_record() {
        let mut store = RecordStore::new();
        assert_eq!(store.delete(7), Err(Error::NotFound(7)));
    }

    #[test]
    fn clear_keeps_id_sequence() {
        let mut store = RecordStore::new();
        store.create(fields(json!({"topic": "A"})));
        store.create(fields(json!({"topic": "B"})));

        store.clear();

        assert!(store.is_empty());
        let id = store.create(fields(json!({"topic": "C"})));
        assert_eq!(id, 3);
    }

    #[test]
    fn list_returns_committed_records() {
        let mut store = RecordStore::new();
        store.create(fields(json!({"topic": "A"})));
        store.create(fields(json!({"topic": "B"})));

        let listed = store.list();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|r| r.is_committed()));
    }

    #[test]
    fn store_serialization() {
        let mut store = RecordStore::new();
        store.create(fields(json!({"topic": "A"})));

        let json = serde_json::to_string(&store).unwrap();
        let restored: RecordStore = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.count(), 1);
        assert_eq!(restored.next_id(), store.next_id());
    }
}
