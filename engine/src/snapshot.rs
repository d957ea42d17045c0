//! Snapshot serialization for durable persistence across restarts.
//!
//! A snapshot covers the record store and the pending queue together.
//! Persisting the store without the queue would silently drop mutations
//! made offline, so [`StoreSnapshot::capture`] takes both and
//! [`StoreSnapshot::into_parts`] hands both back.

use crate::{
    error::Result,
    queue::{PendingOp, PendingQueue},
    store::RecordStore,
    Error, Record, RecordId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current snapshot format version. Bump on incompatible layout changes.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Serializable image of a store plus its undelivered mutations.
///
/// Records live in a `BTreeMap`, so serialization order is deterministic
/// and snapshots of equal state compare equal byte-for-byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Layout version, checked on load
    pub format_version: u32,
    /// Next id the store will assign
    pub next_id: RecordId,
    /// All committed records, keyed by id
    pub records: BTreeMap<RecordId, Record>,
    /// Mutations still awaiting remote delivery
    pub pending: Vec<PendingOp>,
    /// Mutations that exhausted their replay attempts. Defaults to empty
    /// when absent, so snapshots written before the field existed load.
    #[serde(default)]
    pub dead: Vec<PendingOp>,
}

impl StoreSnapshot {
    /// Capture the current state of a store and queue.
    pub fn capture(store: &RecordStore, queue: &PendingQueue) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            next_id: store.next_id(),
            records: store.records().clone(),
            pending: queue.pending(),
            dead: queue.dead_letters().to_vec(),
        }
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty-printed JSON, for files a human may inspect.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Parse and validate a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check internal consistency before the snapshot is loaded.
    pub fn validate(&self) -> Result<()> {
        if self.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported format version {} (current is {})",
                self.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        for (key, record) in &self.records {
            if record.id != Some(*key) {
                return Err(Error::InvalidSnapshot(format!(
                    "record under key {key} carries id {:?}",
                    record.id
                )));
            }
        }
        if let Some(max) = self.records.keys().next_back() {
            // next_id falling behind existing ids would make future creates
            // overwrite committed records.
            if self.next_id <= *max {
                return Err(Error::InvalidSnapshot(format!(
                    "nextId {} does not exceed highest record id {max}",
                    self.next_id
                )));
            }
        }
        Ok(())
    }

    /// Number of records in the snapshot.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Number of undelivered mutations in the snapshot.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of dead-lettered mutations in the snapshot.
    pub fn dead_letter_count(&self) -> usize {
        self.dead.len()
    }

    /// Split into a store, the pending operations and the dead letters.
    pub fn into_parts(self) -> (RecordStore, Vec<PendingOp>, Vec<PendingOp>) {
        (
            RecordStore::restore(self.records, self.next_id),
            self.pending,
            self.dead,
        )
    }
}
