//! Reconciler - the single authority for moving data between the local
//! record store and the remote mirror.
//!
//! One reconciler is constructed per authenticated context and owns its
//! pending queue and a reference to the session, so multiple simulated
//! principals can coexist in tests. At most one reconciliation cycle
//! (queue drain, push, pull or smart sync) runs at a time; the guard is a
//! `tokio::sync::Mutex` acquired with `try_lock`, which stays race-free
//! across the suspension points inside a cycle, unlike a plain boolean
//! check-then-set.

use crate::{
    error::Result,
    mirror::RemoteMirror,
    now_ms,
    queue::{PendingOp, PendingQueue, QueuedMutation},
    session::{Session, SharedSession},
    store::{RecordStore, SharedStore},
    Error, Principal, Record, RecordId, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Status callbacks a UI layer subscribes to for a sync indicator.
///
/// Emitted at the start of each operation, at phase boundaries, per item
/// during push, and on completion. All methods default to no-ops.
pub trait SyncObserver: Send + Sync {
    /// A reconciliation operation began.
    fn on_sync_start(&self, _message: &str) {}
    /// Progress inside an operation (phase changes, per-item push).
    fn on_sync_progress(&self, _message: &str) {}
    /// The operation finished; `timestamp` is the completion time in
    /// milliseconds since epoch.
    fn on_sync_done(&self, _message: &str, _timestamp: Timestamp) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SyncObserver for NullObserver {}

/// Result of a push pass. Failed records were queued for retry, not lost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    /// Records upserted to the mirror
    pub succeeded: usize,
    /// Records that failed and were enqueued for replay
    pub failed: usize,
}

/// Result of a pull pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReport {
    /// Remote records upserted into the local store
    pub applied: usize,
}

/// Result of a queue drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// Operations replayed successfully (remote no-op deletes included)
    pub succeeded: usize,
    /// Operations that failed and returned to the queue
    pub requeued: usize,
    /// Operations that exhausted their attempts this drain
    pub dead_lettered: usize,
}

/// Result of a full smart-sync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub drained: DrainReport,
    pub pushed: PushReport,
    pub pulled: PullReport,
}

/// Orchestrates queue drain, push, pull and smart sync for one session.
pub struct Reconciler {
    store: SharedStore,
    mirror: Arc<dyn RemoteMirror>,
    queue: Mutex<PendingQueue>,
    session: SharedSession,
    cycle: Mutex<()>,
    observer: Arc<dyn SyncObserver>,
}

impl Reconciler {
    /// Create a reconciler with a fresh store, session and queue.
    pub fn new(mirror: Arc<dyn RemoteMirror>) -> Self {
        Self {
            store: RecordStore::new_shared(),
            mirror,
            queue: Mutex::new(PendingQueue::new()),
            session: Session::new_shared(),
            cycle: Mutex::new(()),
            observer: Arc::new(NullObserver),
        }
    }

    /// Use an existing shared store (e.g. one the UI already reads).
    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = store;
        self
    }

    /// Use an existing shared session owned by the application.
    pub fn with_session(mut self, session: SharedSession) -> Self {
        self.session = session;
        self
    }

    /// Subscribe an observer for sync status callbacks.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Bound the pending queue at `capacity` live operations.
    pub fn with_queue_capacity(self, capacity: usize) -> Self {
        Self {
            queue: Mutex::new(PendingQueue::with_capacity(capacity)),
            ..self
        }
    }

    /// Shared handle to the local record store.
    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    /// Shared handle to the session.
    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    /// Live operations awaiting remote delivery.
    pub async fn pending_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Operations that exhausted their replay attempts.
    pub async fn dead_letters(&self) -> Vec<PendingOp> {
        self.queue.lock().await.dead_letters().to_vec()
    }

    // ------------------------------------------------------------------
    // Write-path integration: every local mutation attempts an immediate
    // best-effort remote write after the local commit succeeds, and
    // enqueues on failure. Local commit success never depends on the
    // remote outcome.
    // ------------------------------------------------------------------

    /// Commit a record locally, then sync it to the mirror or queue it.
    ///
    /// A record without an id is created (assigning one); a record with an
    /// id overwrites the existing record and fails with
    /// [`Error::NotFound`] if it does not exist. The returned id refers to
    /// the committed record either way.
    pub async fn save(&self, record: Record) -> Result<RecordId> {
        let Record { id, fields } = record;
        let committed = {
            let mut store = self.store.write().await;
            let id = match id {
                Some(id) => store.update(id, fields)?,
                None => store.create(fields),
            };
            store.get(id).cloned().ok_or(Error::NotFound(id))?
        };
        let id = committed.require_id()?;

        self.sync_after_commit(QueuedMutation::Save { record: committed })
            .await?;
        Ok(id)
    }

    /// Delete a record locally, then sync the deletion or queue it.
    pub async fn remove(&self, id: RecordId) -> Result<()> {
        self.store.write().await.delete(id)?;
        self.sync_after_commit(QueuedMutation::Delete { id }).await
    }

    /// Discard all local records, e.g. before a fresh pull.
    pub async fn clear_local(&self) {
        self.store.write().await.clear();
    }

    /// Remove every remote document of the authenticated principal.
    pub async fn purge_remote(&self) -> Result<usize> {
        let principal = self.authenticated_principal().await?;
        let purged = self.mirror.purge(&principal).await?;
        tracing::info!(principal = %principal, purged, "remote documents purged");
        Ok(purged)
    }

    async fn sync_after_commit(&self, mutation: QueuedMutation) -> Result<()> {
        let principal = match self.authenticated_principal().await {
            Ok(principal) => principal,
            Err(_) => {
                // Not logged in yet; deliver once the queue drains.
                tracing::debug!("unauthenticated, queueing mutation for later replay");
                return self.queue.lock().await.enqueue(mutation, now_ms());
            }
        };

        let outcome = match &mutation {
            QueuedMutation::Save { record } => self.mirror.upsert(&principal, record).await,
            QueuedMutation::Delete { id } => {
                self.mirror.delete_by_local_id(&principal, *id).await
            }
        };

        match outcome {
            Ok(()) => Ok(()),
            // Programmer error in a collaborator; reject loudly.
            Err(Error::MissingId) => Err(Error::MissingId),
            Err(e) => {
                tracing::warn!(error = %e, "remote write failed, queueing for retry");
                self.queue.lock().await.enqueue(mutation, now_ms())
            }
        }
    }

    // ------------------------------------------------------------------
    // Reconciliation operations. Each public operation holds the cycle
    // guard for its whole duration; a second request while one is in
    // flight gets `Error::Busy` instead of queueing or parallelizing.
    // ------------------------------------------------------------------

    /// Upsert every local record to the mirror.
    ///
    /// Strictly additive: remote-only documents are never deleted here.
    /// Failed upserts are queued and counted in `failed`.
    pub async fn push(&self) -> Result<PushReport> {
        let _guard = self.cycle.try_lock().map_err(|_| Error::Busy)?;
        self.observer.on_sync_start("Pushing changes to remote");
        let report = self.push_locked().await?;
        self.observer.on_sync_done("All changes saved", now_ms());
        Ok(report)
    }

    /// Fold every remote document into the local store.
    ///
    /// An upsert by id, never a delete: a local record absent from the
    /// remote set stays untouched. Remote wins for what remote has.
    pub async fn pull(&self) -> Result<PullReport> {
        let _guard = self.cycle.try_lock().map_err(|_| Error::Busy)?;
        self.observer.on_sync_start("Pulling updates from remote");
        let report = self.pull_locked().await?;
        self.observer.on_sync_done("Up to date", now_ms());
        Ok(report)
    }

    /// Replay queued mutations against the mirror.
    pub async fn drain_queue(&self) -> Result<DrainReport> {
        let _guard = self.cycle.try_lock().map_err(|_| Error::Busy)?;
        self.observer.on_sync_start("Replaying queued changes");
        let report = self.drain_locked().await?;
        self.observer.on_sync_done("Queue processed", now_ms());
        Ok(report)
    }

    /// Full cycle: drain the queue, push, then pull, strictly in order.
    ///
    /// Draining first gets offline-made saves and deletes to the remote
    /// before push re-reads the store, and pull runs last so remote state
    /// produced by the first two phases folds back in. Returns
    /// [`Error::Busy`] if a cycle is already running.
    pub async fn smart_sync(&self) -> Result<SyncReport> {
        let _guard = self.cycle.try_lock().map_err(|_| Error::Busy)?;
        self.observer.on_sync_start("Syncing with remote");

        self.observer.on_sync_progress("Replaying queued changes");
        let drained = self.drain_locked().await?;

        self.observer.on_sync_progress("Pushing local records");
        let pushed = self.push_locked().await?;

        self.observer.on_sync_progress("Pulling remote records");
        let pulled = self.pull_locked().await?;

        self.observer.on_sync_done("All changes saved", now_ms());
        tracing::info!(
            drained = drained.succeeded,
            pushed = pushed.succeeded,
            pulled = pulled.applied,
            "smart sync completed"
        );
        Ok(SyncReport {
            drained,
            pushed,
            pulled,
        })
    }

    async fn push_locked(&self) -> Result<PushReport> {
        let principal = self.authenticated_principal().await?;
        // Clone out of the store so collaborator reads are not blocked
        // across remote calls.
        let records = self.store.read().await.list();
        let total = records.len();

        let mut report = PushReport::default();
        for (index, record) in records.into_iter().enumerate() {
            self.observer
                .on_sync_progress(&format!("Pushing record {}/{}", index + 1, total));
            match self.mirror.upsert(&principal, &record).await {
                Ok(()) => report.succeeded += 1,
                Err(Error::MissingId) => return Err(Error::MissingId),
                Err(e) => {
                    tracing::warn!(record_id = ?record.id, error = %e, "push failed, queueing");
                    self.queue
                        .lock()
                        .await
                        .enqueue(QueuedMutation::Save { record }, now_ms())?;
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn pull_locked(&self) -> Result<PullReport> {
        let principal = self.authenticated_principal().await?;
        let remote = self.mirror.fetch_all(&principal).await?;

        let mut report = PullReport::default();
        for record in remote {
            match record.id {
                Some(id) => {
                    self.store.write().await.upsert(id, record.fields);
                    report.applied += 1;
                }
                // Hydration always sets the id; a bare record here means a
                // corrupt remote document. Skip it rather than invent an id.
                None => tracing::warn!("skipping remote record without local id"),
            }
        }
        Ok(report)
    }

    async fn drain_locked(&self) -> Result<DrainReport> {
        if self.queue.lock().await.is_empty() {
            return Ok(DrainReport::default());
        }
        // Resolve the principal before taking the snapshot, so an
        // unauthenticated drain leaves the queue untouched.
        let principal = self.authenticated_principal().await?;
        let snapshot = self.queue.lock().await.take_all();

        tracing::info!(queued = snapshot.len(), "draining pending queue");
        let mut report = DrainReport::default();
        for op in snapshot {
            let outcome = match &op.mutation {
                QueuedMutation::Save { record } => self.mirror.upsert(&principal, record).await,
                // Absent remote document is a success: the delete's intent
                // already holds.
                QueuedMutation::Delete { id } => {
                    self.mirror.delete_by_local_id(&principal, *id).await
                }
            };
            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    tracing::warn!(
                        record_id = ?op.mutation.record_id(),
                        attempts = op.attempts,
                        error = %e,
                        "queued replay failed"
                    );
                    if self.queue.lock().await.requeue(op) {
                        report.requeued += 1;
                    } else {
                        report.dead_lettered += 1;
                    }
                }
            }
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Session and connectivity triggers, called by the surrounding
    // application's auth and network layers.
    // ------------------------------------------------------------------

    /// The user authenticated: enable reconciliation and immediately drain
    /// anything accumulated while logged out.
    pub async fn on_authenticated(&self, principal: impl Into<Principal>) -> Result<DrainReport> {
        let principal = principal.into();
        tracing::info!(principal = %principal, "session authenticated, sync enabled");
        self.session.write().await.authenticate(principal);
        self.drain_queue().await
    }

    /// The user logged out: disable reconciliation. The queue is retained
    /// so re-authentication can still replay it.
    pub async fn on_deauthenticated(&self) {
        tracing::info!("session deauthenticated, sync disabled");
        self.session.write().await.deauthenticate();
    }

    /// Standing trigger for connectivity-restored (or app-foregrounded)
    /// events. Runs a smart sync when reconciliation is enabled; returns
    /// `None` when it is disabled or a cycle is already in flight.
    pub async fn on_connectivity_restored(&self) -> Result<Option<SyncReport>> {
        if !self.session.read().await.sync_enabled() {
            return Ok(None);
        }
        match self.smart_sync().await {
            Ok(report) => Ok(Some(report)),
            Err(Error::Busy) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------
    // Durability: snapshots cover the store and the pending queue, so a
    // restart does not silently drop undelivered mutations.
    // ------------------------------------------------------------------

    /// Capture the store and pending queue as a snapshot.
    pub async fn export_state(&self) -> crate::snapshot::StoreSnapshot {
        let store = self.store.read().await;
        let queue = self.queue.lock().await;
        crate::snapshot::StoreSnapshot::capture(&store, &queue)
    }

    /// Replace the store, pending queue and dead letters with a
    /// snapshot's state.
    pub async fn import_state(&self, snapshot: crate::snapshot::StoreSnapshot) -> Result<()> {
        snapshot.validate()?;
        let (store, pending, dead) = snapshot.into_parts();
        *self.store.write().await = store;
        self.queue.lock().await.restore(pending, dead);
        Ok(())
    }

    async fn authenticated_principal(&self) -> Result<Principal> {
        let session = self.session.read().await;
        match session.principal() {
            Some(principal) if session.sync_enabled() => Ok(principal.clone()),
            _ => Err(Error::NotAuthenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryMirror;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> crate::Fields {
        Record::fields_from(value)
    }

    fn reconciler() -> (Reconciler, Arc<MemoryMirror>) {
        let mirror = Arc::new(MemoryMirror::new());
        (Reconciler::new(mirror.clone()), mirror)
    }

    #[tokio::test]
    async fn save_commits_locally_and_remotely() {
        let (reconciler, mirror) = reconciler();
        reconciler.on_authenticated("alice").await.unwrap();

        let id = reconciler
            .save(Record::new(fields(json!({"topic": "Intro"}))))
            .await
            .unwrap();

        assert_eq!(id, 1);
        assert_eq!(mirror.document_count("alice"), 1);
        assert_eq!(reconciler.pending_count().await, 0);
    }

    #[tokio::test]
    async fn save_queues_when_remote_down() {
        let (reconciler, mirror) = reconciler();
        reconciler.on_authenticated("alice").await.unwrap();
        mirror.set_offline(true);

        let id = reconciler
            .save(Record::new(fields(json!({"topic": "Intro"}))))
            .await
            .unwrap();

        // Local commit succeeded despite the remote failure.
        assert_eq!(id, 1);
        assert!(reconciler.store().read().await.get(1).is_some());
        assert_eq!(reconciler.pending_count().await, 1);
    }

    #[tokio::test]
    async fn save_with_unknown_id_is_not_found() {
        let (reconciler, _mirror) = reconciler();

        let result = reconciler
            .save(Record::with_id(42, fields(json!({"topic": "Ghost"}))))
            .await;

        assert_eq!(result, Err(Error::NotFound(42)));
    }

    #[tokio::test]
    async fn remove_while_unauthenticated_queues_delete() {
        let (reconciler, _mirror) = reconciler();
        let id = reconciler
            .save(Record::new(fields(json!({"topic": "Intro"}))))
            .await
            .unwrap();

        reconciler.remove(id).await.unwrap();

        assert!(reconciler.store().read().await.get(id).is_none());
        // Save coalesced away by the delete; only the delete remains.
        assert_eq!(reconciler.pending_count().await, 1);
    }

    #[tokio::test]
    async fn push_counts_successes_and_queued_failures() {
        let (reconciler, mirror) = reconciler();
        reconciler.on_authenticated("alice").await.unwrap();
        {
            let store = reconciler.store();
            let mut store = store.write().await;
            store.create(fields(json!({"topic": "A"})));
            store.create(fields(json!({"topic": "B"})));
        }

        let report = reconciler.push().await.unwrap();
        assert_eq!(report, PushReport { succeeded: 2, failed: 0 });

        mirror.set_offline(true);
        let report = reconciler.push().await.unwrap();
        assert_eq!(report, PushReport { succeeded: 0, failed: 2 });
        assert_eq!(reconciler.pending_count().await, 2);
    }

    #[tokio::test]
    async fn push_is_additive_to_remote_only_documents() {
        let (reconciler, mirror) = reconciler();
        reconciler.on_authenticated("alice").await.unwrap();
        mirror.insert_document(
            "alice",
            crate::RemoteDocument {
                local_id: "9".into(),
                fields: fields(json!({"topic": "X"})),
                synced_at: 0,
            },
        );
        reconciler
            .save(Record::new(fields(json!({"topic": "Local"}))))
            .await
            .unwrap();

        reconciler.push().await.unwrap();

        assert!(mirror.document("alice", 9).is_some());
    }

    #[tokio::test]
    async fn pull_applies_remote_and_never_deletes_local() {
        let (reconciler, mirror) = reconciler();
        reconciler.on_authenticated("alice").await.unwrap();

        // Local record 5 exists nowhere remotely.
        reconciler.store().write().await.upsert(5, fields(json!({"topic": "Local only"})));
        for id in [1u64, 2, 3] {
            mirror.insert_document(
                "alice",
                crate::RemoteDocument {
                    local_id: id.to_string(),
                    fields: fields(json!({"topic": format!("remote {id}")})),
                    synced_at: 0,
                },
            );
        }

        let report = reconciler.pull().await.unwrap();

        assert_eq!(report, PullReport { applied: 3 });
        let store = reconciler.store();
        let store = store.read().await;
        assert_eq!(store.count(), 4);
        assert!(store.get(5).is_some());
        assert_eq!(store.get(2).unwrap().fields.get("topic"), Some(&json!("remote 2")));
    }

    #[tokio::test]
    async fn drain_replays_in_order_and_requeues_failures() {
        let (reconciler, mirror) = reconciler();

        // Queued while logged out.
        reconciler
            .save(Record::new(fields(json!({"topic": "Offline"}))))
            .await
            .unwrap();
        assert_eq!(reconciler.pending_count().await, 1);

        // Authentication drains immediately.
        let report = reconciler.on_authenticated("alice").await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(reconciler.pending_count().await, 0);
        assert_eq!(mirror.document_count("alice"), 1);
    }

    #[tokio::test]
    async fn drain_of_never_synced_delete_is_success() {
        let (reconciler, _mirror) = reconciler();
        let id = reconciler
            .save(Record::new(fields(json!({"topic": "Never pushed"}))))
            .await
            .unwrap();
        reconciler.remove(id).await.unwrap();

        let report = reconciler.on_authenticated("alice").await.unwrap();

        // The remote document never existed; the no-op delete still counts
        // as delivered.
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.requeued, 0);
        assert_eq!(reconciler.pending_count().await, 0);
    }

    #[tokio::test]
    async fn drain_requeues_on_persistent_failure() {
        let (reconciler, mirror) = reconciler();
        reconciler.on_authenticated("alice").await.unwrap();
        mirror.set_offline(true);
        reconciler
            .save(Record::new(fields(json!({"topic": "Stuck"}))))
            .await
            .unwrap();

        let report = reconciler.drain_queue().await.unwrap();

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.requeued, 1);
        assert_eq!(reconciler.pending_count().await, 1);
    }

    #[tokio::test]
    async fn drain_dead_letters_after_max_attempts() {
        let (reconciler, mirror) = reconciler();
        reconciler.on_authenticated("alice").await.unwrap();
        mirror.set_offline(true);
        reconciler
            .save(Record::new(fields(json!({"topic": "Doomed"}))))
            .await
            .unwrap();

        let mut dead_lettered = 0;
        for _ in 0..crate::MAX_ATTEMPTS {
            let report = reconciler.drain_queue().await.unwrap();
            dead_lettered += report.dead_lettered;
        }

        assert_eq!(dead_lettered, 1);
        assert_eq!(reconciler.pending_count().await, 0);
        assert_eq!(reconciler.dead_letters().await.len(), 1);
    }

    #[tokio::test]
    async fn drain_without_principal_leaves_queue_untouched() {
        let (reconciler, _mirror) = reconciler();
        reconciler
            .save(Record::new(fields(json!({"topic": "Waiting"}))))
            .await
            .unwrap();

        let result = reconciler.drain_queue().await;

        assert_eq!(result, Err(Error::NotAuthenticated));
        assert_eq!(reconciler.pending_count().await, 1);
    }

    #[tokio::test]
    async fn smart_sync_runs_drain_push_pull() {
        let (reconciler, mirror) = reconciler();

        // One save queued while logged out.
        reconciler
            .save(Record::new(fields(json!({"topic": "Queued"}))))
            .await
            .unwrap();
        reconciler.session().write().await.authenticate("alice".into());

        // One remote-only document to pull.
        mirror.insert_document(
            "alice",
            crate::RemoteDocument {
                local_id: "50".into(),
                fields: fields(json!({"topic": "Remote"})),
                synced_at: 0,
            },
        );

        let report = reconciler.smart_sync().await.unwrap();

        assert_eq!(report.drained.succeeded, 1);
        assert_eq!(report.pushed.succeeded, 1);
        // Pull folds back the pushed document plus the remote-only one.
        assert_eq!(report.pulled.applied, 2);
        assert_eq!(reconciler.store().read().await.count(), 2);
    }

    #[tokio::test]
    async fn concurrent_smart_sync_gets_busy() {
        let (reconciler, _mirror) = reconciler();
        let reconciler = Arc::new(reconciler);
        reconciler.on_authenticated("alice").await.unwrap();
        for i in 0..50u64 {
            reconciler
                .save(Record::new(fields(json!({"topic": format!("t{i}")}))))
                .await
                .unwrap();
        }

        let first = tokio::spawn({
            let reconciler = Arc::clone(&reconciler);
            async move { reconciler.smart_sync().await }
        });
        let second = tokio::spawn({
            let reconciler = Arc::clone(&reconciler);
            async move { reconciler.smart_sync().await }
        });

        let (first, second) = (first.await.unwrap(), second.await.unwrap());
        let busy_count = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Err(Error::Busy)))
            .count();
        let ok_count = [&first, &second].iter().filter(|r| r.is_ok()).count();

        // Exactly one cycle completed; the loser saw Busy. With a small
        // store both may also finish sequentially, so allow 2/0 as well.
        assert_eq!(ok_count + busy_count, 2);
        assert!(ok_count >= 1);
    }

    #[tokio::test]
    async fn connectivity_trigger_is_noop_when_logged_out() {
        let (reconciler, _mirror) = reconciler();
        let result = reconciler.on_connectivity_restored().await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn connectivity_trigger_syncs_when_enabled() {
        let (reconciler, _mirror) = reconciler();
        reconciler.on_authenticated("alice").await.unwrap();
        reconciler
            .save(Record::new(fields(json!({"topic": "Intro"}))))
            .await
            .unwrap();

        let report = reconciler.on_connectivity_restored().await.unwrap();
        assert!(report.is_some());
    }

    #[tokio::test]
    async fn deauthentication_retains_queue() {
        let (reconciler, mirror) = reconciler();
        reconciler.on_authenticated("alice").await.unwrap();
        mirror.set_offline(true);
        reconciler
            .save(Record::new(fields(json!({"topic": "Held"}))))
            .await
            .unwrap();

        reconciler.on_deauthenticated().await;
        assert_eq!(reconciler.pending_count().await, 1);

        mirror.set_offline(false);
        let report = reconciler.on_authenticated("alice").await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(mirror.document_count("alice"), 1);
    }

    #[tokio::test]
    async fn purge_remote_clears_principal_documents() {
        let (reconciler, mirror) = reconciler();
        reconciler.on_authenticated("alice").await.unwrap();
        reconciler
            .save(Record::new(fields(json!({"topic": "A"}))))
            .await
            .unwrap();

        let purged = reconciler.purge_remote().await.unwrap();

        assert_eq!(purged, 1);
        assert_eq!(mirror.document_count("alice"), 0);
    }

    #[tokio::test]
    async fn observer_receives_lifecycle_callbacks() {
        use std::sync::Mutex as StdMutex;

        #[derive(Default)]
        struct Recording {
            events: StdMutex<Vec<String>>,
        }
        impl SyncObserver for Recording {
            fn on_sync_start(&self, message: &str) {
                self.events.lock().unwrap().push(format!("start: {message}"));
            }
            fn on_sync_progress(&self, message: &str) {
                self.events.lock().unwrap().push(format!("progress: {message}"));
            }
            fn on_sync_done(&self, message: &str, _timestamp: Timestamp) {
                self.events.lock().unwrap().push(format!("done: {message}"));
            }
        }

        let mirror = Arc::new(MemoryMirror::new());
        let observer = Arc::new(Recording::default());
        let reconciler = Reconciler::new(mirror).with_observer(observer.clone());
        reconciler.on_authenticated("alice").await.unwrap();
        reconciler
            .save(Record::new(fields(json!({"topic": "Intro"}))))
            .await
            .unwrap();

        reconciler.smart_sync().await.unwrap();

        let events = observer.events.lock().unwrap();
        assert!(events.iter().any(|e| e == "start: Syncing with remote"));
        assert!(events.iter().any(|e| e.starts_with("progress: Pushing record 1/")));
        assert!(events.last().unwrap().starts_with("done: All changes saved"));
    }
}
