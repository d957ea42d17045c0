//! # Tally Engine
//!
//! An offline-first synchronization engine for record-tracking applications.
//!
//! The engine keeps a local durable store and a remote authoritative store
//! eventually consistent under unreliable connectivity, without losing writes
//! and without blocking callers on remote outcomes.
//!
//! ## Design Principles
//!
//! - **Local first**: every mutation commits locally before any remote call,
//!   and local success is never gated on remote success
//! - **No remote write is silently dropped**: a mutation either reaches the
//!   remote immediately or is queued for later replay
//! - **One cycle at a time**: at most one reconciliation cycle runs per
//!   session, enforced with a real lock rather than a boolean flag
//! - **Testable**: the remote side is a trait; [`MemoryMirror`] provides a
//!   reference implementation with failure injection
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] is an open set of named scalar fields plus an optional
//! identifier. The [`RecordStore`] assigns identifiers on first create; a
//! record without an id has never been committed.
//!
//! ### Remote Mirror
//!
//! The [`RemoteMirror`] trait is the authoritative remote copy, one document
//! per `(principal, localId)` pair. Upserts merge fields rather than replace
//! documents, so a partial write never erases omitted fields.
//!
//! ### Pending Queue
//!
//! Mutations that cannot reach the mirror land in the [`PendingQueue`] and
//! are replayed by the next queue drain. The queue is bounded, coalesces
//! writes per record, and moves operations that keep failing to a
//! dead-letter list instead of retrying forever.
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] owns the whole protocol: queue drain, push
//! (local to remote), pull (remote to local) and smart sync (drain, then
//! push, then pull). Push is strictly additive and pull never deletes local
//! records; conflict resolution is last-writer-wins at record granularity,
//! an accepted limitation documented in DESIGN.md.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tally_engine::{MemoryMirror, Reconciler, Record};
//! use serde_json::json;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let mirror = Arc::new(MemoryMirror::new());
//! let reconciler = Reconciler::new(mirror);
//!
//! reconciler.on_authenticated("user-1").await.unwrap();
//!
//! let fields = Record::fields_from(json!({"topic": "Intro", "week": 1}));
//! let id = reconciler.save(Record::new(fields)).await.unwrap();
//! assert_eq!(id, 1);
//!
//! let report = reconciler.smart_sync().await.unwrap();
//! assert_eq!(report.pushed.succeeded, 1);
//! # });
//! ```
//!
//! ## Persistence
//!
//! [`Reconciler::export_state`] and [`Reconciler::import_state`] round-trip
//! the record store *and* the pending queue through a [`StoreSnapshot`], so
//! a process restart does not silently drop undelivered mutations.

pub mod error;
pub mod mirror;
pub mod queue;
pub mod reconciler;
pub mod record;
pub mod session;
pub mod snapshot;
pub mod store;

pub use error::Error;
pub use mirror::{MemoryMirror, RemoteDocument, RemoteMirror};
pub use queue::{PendingOp, PendingQueue, QueuedMutation, MAX_ATTEMPTS};
pub use reconciler::{
    DrainReport, NullObserver, PullReport, PushReport, Reconciler, SyncObserver, SyncReport,
};
pub use record::{Fields, Record};
pub use session::{Session, SharedSession};
pub use snapshot::{StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{RecordStore, SharedStore};

/// Type aliases for clarity
pub type RecordId = u64;
pub type Principal = String;
pub type Timestamp = u64;

/// Milliseconds since the Unix epoch.
///
/// Timestamps in the engine are observability data (queue age, last-sync
/// marks); they are never used for conflict resolution.
pub fn now_ms() -> Timestamp {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}
