//! Session state shared between the surrounding application and the engine.

use crate::Principal;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle to a session. The application's auth layer writes it via
/// the reconciler's trigger entry points; the engine otherwise only reads.
pub type SharedSession = Arc<RwLock<Session>>;

/// The authenticated principal (if any) and whether reconciliation is
/// currently enabled for it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    principal: Option<Principal>,
    sync_enabled: bool,
}

impl Session {
    /// A logged-out session with reconciliation disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh session in a shared handle.
    pub fn new_shared() -> SharedSession {
        Arc::new(RwLock::new(Self::new()))
    }

    /// The authenticated principal, if any.
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Whether reconciliation is enabled.
    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled
    }

    /// Enable reconciliation for a principal. Usually reached through
    /// [`crate::Reconciler::on_authenticated`], which also drains the
    /// pending queue.
    pub fn authenticate(&mut self, principal: Principal) {
        self.principal = Some(principal);
        self.sync_enabled = true;
    }

    /// Disable reconciliation and forget the principal.
    pub fn deauthenticate(&mut self) {
        self.principal = None;
        self.sync_enabled = false;
    }
}
