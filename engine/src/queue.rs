//! PendingQueue - mutations awaiting successful remote delivery.
//!
//! Remote writes that fail, or that are attempted while unauthenticated,
//! land here and are replayed by the next queue drain. The queue is
//! bounded, coalesces writes per record, carries an attempt counter with
//! a dead-letter outcome, and serializes into snapshots so a restart does
//! not silently discard undelivered mutations.

use crate::{Error, Record, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Replay attempts before an operation is dead-lettered.
pub const MAX_ATTEMPTS: u32 = 5;

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A mutation that must eventually reach the remote mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QueuedMutation {
    /// Upsert this record's document.
    Save { record: Record },
    /// Remove the document correlated with this id.
    Delete { id: RecordId },
}

impl QueuedMutation {
    /// The record id this mutation targets, when committed.
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            QueuedMutation::Save { record } => record.id,
            QueuedMutation::Delete { id } => Some(*id),
        }
    }
}

/// A queued mutation with its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOp {
    /// The mutation to replay
    pub mutation: QueuedMutation,
    /// When it was first enqueued (milliseconds since epoch)
    pub enqueued_at: Timestamp,
    /// Failed replay attempts so far
    pub attempts: u32,
}

impl PendingOp {
    /// Wrap a mutation for its first enqueue.
    pub fn new(mutation: QueuedMutation, enqueued_at: Timestamp) -> Self {
        Self {
            mutation,
            enqueued_at,
            attempts: 0,
        }
    }
}

/// Ordered log of mutations awaiting remote delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQueue {
    ops: VecDeque<PendingOp>,
    capacity: usize,
    dead: Vec<PendingOp>,
}

impl PendingQueue {
    /// Create a queue with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a queue bounded at `capacity` live operations.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: VecDeque::new(),
            capacity,
            dead: Vec::new(),
        }
    }

    /// Append a mutation to the tail, coalescing per record id.
    ///
    /// A newer Save for a record replaces any queued Save for the same
    /// record in place, keeping the original queue position. A Delete
    /// removes queued Saves for that record first; replaying a Save for a
    /// record that is about to be deleted would only waste a remote write.
    pub fn enqueue(&mut self, mutation: QueuedMutation, now: Timestamp) -> Result<(), Error> {
        match &mutation {
            QueuedMutation::Save { record } => {
                if let Some(id) = record.id {
                    if let Some(existing) = self.ops.iter_mut().find(|op| {
                        matches!(&op.mutation, QueuedMutation::Save { record: r } if r.id == Some(id))
                    }) {
                        existing.mutation = mutation;
                        return Ok(());
                    }
                }
            }
            QueuedMutation::Delete { id } => {
                self.ops.retain(|op| {
                    !matches!(&op.mutation, QueuedMutation::Save { record } if record.id == Some(*id))
                });
                if self.ops.iter().any(|op| {
                    matches!(&op.mutation, QueuedMutation::Delete { id: queued } if queued == id)
                }) {
                    return Ok(());
                }
            }
        }

        if self.ops.len() >= self.capacity {
            tracing::error!(capacity = self.capacity, "pending queue full, rejecting mutation");
            return Err(Error::QueueFull {
                capacity: self.capacity,
            });
        }

        self.ops.push_back(PendingOp::new(mutation, now));
        tracing::debug!(pending = self.ops.len(), "mutation queued for remote delivery");
        Ok(())
    }

    /// Take a snapshot of the live queue, leaving it empty.
    ///
    /// The drain loop replays the snapshot in original order and feeds
    /// failures back through [`PendingQueue::requeue`].
    pub fn take_all(&mut self) -> Vec<PendingOp> {
        self.ops.drain(..).collect()
    }

    /// Return a failed operation to the live queue.
    ///
    /// Called in snapshot order, so operations that keep failing preserve
    /// their original relative order. After [`MAX_ATTEMPTS`] failed
    /// replays the operation moves to the dead-letter list instead;
    /// returns `false` in that case.
    ///
    /// The per-record coalescing of [`PendingQueue::enqueue`] applies with
    /// reversed precedence: anything enqueued while the drain was in
    /// flight is newer than the failed operation, so a requeued mutation
    /// is discarded outright when the queue already holds one for the same
    /// record. Appending it instead would replay it *after* the newer
    /// mutation and undo it remotely.
    pub fn requeue(&mut self, mut op: PendingOp) -> bool {
        op.attempts += 1;
        if op.attempts >= MAX_ATTEMPTS {
            tracing::error!(
                attempts = op.attempts,
                record_id = ?op.mutation.record_id(),
                "pending operation dead-lettered"
            );
            self.dead.push(op);
            return false;
        }

        if let Some(id) = op.mutation.record_id() {
            let superseded = self
                .ops
                .iter()
                .any(|queued| queued.mutation.record_id() == Some(id));
            if superseded {
                tracing::debug!(record_id = id, "requeued mutation superseded, dropping");
                return true;
            }
        }

        self.ops.push_back(op);
        true
    }

    /// Live operations awaiting replay.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if no operations await replay.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Operations that exhausted their replay attempts. Surfaced to the
    /// collaborator; the engine never retries them again.
    pub fn dead_letters(&self) -> &[PendingOp] {
        &self.dead
    }

    /// Snapshot of the live operations, oldest first.
    pub fn pending(&self) -> Vec<PendingOp> {
        self.ops.iter().cloned().collect()
    }

    pub(crate) fn restore(&mut self, ops: Vec<PendingOp>, dead: Vec<PendingOp>) {
        self.ops = ops.into();
        self.dead = dead;
    }
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}
