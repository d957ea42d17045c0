//! RemoteMirror - the authoritative remote copy of the record store.
//!
//! One remote document exists per `(principal, localId)` pair, correlated
//! with the local store through `localId` alone so remote-generated keys
//! never leak into the local model. Implementations hold no queue and
//! perform no local writes; any failure surfaces to the caller and retry
//! is the reconciler's responsibility exclusively, which keeps a mirror
//! trivial to stand in for with [`MemoryMirror`] in tests.

use crate::{error::Result, now_ms, Error, Fields, Record, RecordId, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The remote-side representation of a [`Record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    /// The originating record's id, as a string. The sole correlation key
    /// between the stores.
    pub local_id: String,
    /// Merged field set
    pub fields: Fields,
    /// Last successful upsert, milliseconds since epoch. Observability
    /// only; never consulted for conflict resolution.
    pub synced_at: Timestamp,
}

impl RemoteDocument {
    /// Build a document from a committed record.
    ///
    /// An uncommitted record cannot be synchronized; this rejects it with
    /// [`Error::MissingId`] rather than writing under a placeholder key.
    pub fn from_record(record: &Record, synced_at: Timestamp) -> Result<Self> {
        let id = record.require_id()?;
        Ok(Self {
            local_id: id.to_string(),
            fields: record.fields.clone(),
            synced_at,
        })
    }

    /// Re-hydrate the document into record shape, keyed by `localId`.
    pub fn to_record(&self) -> Option<Record> {
        let id: RecordId = self.local_id.parse().ok()?;
        Some(Record::with_id(id, self.fields.clone()))
    }

    /// Merge another payload into this document's fields.
    ///
    /// A later partial write does not erase fields omitted from it.
    pub fn merge_fields(&mut self, incoming: &Fields, synced_at: Timestamp) {
        for (key, value) in incoming {
            self.fields.insert(key.clone(), value.clone());
        }
        self.synced_at = synced_at;
    }
}

/// Remote document storage scoped by authenticated principal.
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    /// Write (merge-upsert) the document for `record.id`. Idempotent under
    /// `(principal, localId)`. Rejects uncommitted records with
    /// [`Error::MissingId`].
    async fn upsert(&self, principal: &str, record: &Record) -> Result<()>;

    /// Every document of the principal, re-hydrated into record shape.
    async fn fetch_all(&self, principal: &str) -> Result<Vec<Record>>;

    /// Remove the document whose `localId` equals `id`. A no-op, not an
    /// error, if none exists.
    async fn delete_by_local_id(&self, principal: &str, id: RecordId) -> Result<()>;

    /// Remove every document of the principal.
    async fn purge(&self, principal: &str) -> Result<usize>;
}

/// In-memory [`RemoteMirror`] with failure injection.
///
/// The reference implementation used by the engine's own tests and by
/// collaborators that want a local-only deployment. `set_offline(true)`
/// makes every call fail with [`Error::RemoteUnavailable`], simulating
/// lost connectivity.
#[derive(Debug, Default)]
pub struct MemoryMirror {
    documents: Mutex<HashMap<String, BTreeMap<RecordId, RemoteDocument>>>,
    offline: AtomicBool,
}

impl MemoryMirror {
    /// Create an empty, online mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Force or lift simulated connectivity loss.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of documents held for a principal.
    pub fn document_count(&self, principal: &str) -> usize {
        self.docs()
            .get(principal)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    /// Direct document lookup, for assertions in tests.
    pub fn document(&self, principal: &str, id: RecordId) -> Option<RemoteDocument> {
        self.docs()
            .get(principal)
            .and_then(|docs| docs.get(&id))
            .cloned()
    }

    /// Seed a document directly, bypassing the upsert path.
    pub fn insert_document(&self, principal: &str, document: RemoteDocument) {
        if let Ok(id) = document.local_id.parse::<RecordId>() {
            self.docs()
                .entry(principal.to_string())
                .or_default()
                .insert(id, document);
        }
    }

    fn docs(&self) -> MutexGuard<'_, HashMap<String, BTreeMap<RecordId, RemoteDocument>>> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(Error::RemoteUnavailable("mirror offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteMirror for MemoryMirror {
    async fn upsert(&self, principal: &str, record: &Record) -> Result<()> {
        self.check_online()?;
        let id = record.require_id()?;
        let now = now_ms();

        let mut documents = self.docs();
        let docs = documents.entry(principal.to_string()).or_default();
        match docs.get_mut(&id) {
            Some(existing) => existing.merge_fields(&record.fields, now),
            None => {
                docs.insert(id, RemoteDocument::from_record(record, now)?);
            }
        }
        Ok(())
    }

    async fn fetch_all(&self, principal: &str) -> Result<Vec<Record>> {
        self.check_online()?;
        Ok(self
            .docs()
            .get(principal)
            .map(|docs| docs.values().filter_map(RemoteDocument::to_record).collect())
            .unwrap_or_default())
    }

    async fn delete_by_local_id(&self, principal: &str, id: RecordId) -> Result<()> {
        self.check_online()?;
        if let Some(docs) = self.docs().get_mut(principal) {
            docs.remove(&id);
        }
        Ok(())
    }

    async fn purge(&self, principal: &str) -> Result<usize> {
        self.check_online()?;
        Ok(self
            .docs()
            .remove(principal)
            .map(|docs| docs.len())
            .unwrap_or(0))
    }
}
