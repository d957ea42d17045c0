//! Error types for the Tally engine.

use crate::RecordId;
use thiserror::Error;

/// All possible errors from the Tally engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A local lookup, update or delete targeted a record that does not
    /// exist. Recovered by the caller.
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// A network, auth or permission failure on a Remote Mirror call.
    /// Absorbed by the reconciler and converted into a queued retry.
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// A reconciliation operation was requested while a cycle is already
    /// in flight. A no-op signal, not a failure requiring user action.
    #[error("reconciliation already in progress")]
    Busy,

    /// A record with no assigned id reached the remote write path. This is
    /// a programmer error in a collaborator and is rejected loudly rather
    /// than silently skipped.
    #[error("record has no assigned id")]
    MissingId,

    /// No authenticated principal; remote operations cannot proceed.
    #[error("no authenticated principal")]
    NotAuthenticated,

    /// The pending queue reached its configured capacity.
    #[error("pending queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// A snapshot could not be parsed or is internally inconsistent.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
