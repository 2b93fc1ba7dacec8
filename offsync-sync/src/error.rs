//! Error types for the sync layer.

use offsync_storage::StorageError;
use offsync_types::{Identity, Kind};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local persistence failed. Fatal to the operation that triggered it.
    #[error("persistence error: {0}")]
    Persistence(#[from] StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record could not be rebuilt from a field map.
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] offsync_model::ModelError),

    /// The authority refused one kind of the batch.
    #[error("remote rejected {kind} batch: {reason}")]
    RemoteRejected { kind: Kind, reason: String },

    /// The authority could not be reached.
    #[error("remote unreachable: {0}")]
    RemoteUnreachable(String),

    /// Another flush already covers some of these kinds.
    #[error("flush already in flight for {kinds:?}")]
    ConcurrentFlush { kinds: Vec<Kind> },

    /// Loading from the authority failed.
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),

    /// No record with this identity exists locally.
    #[error("record not found: {0}")]
    RecordNotFound(Identity),
}

impl SyncError {
    /// Returns true if the journal is intact and the operation can simply be
    /// attempted again later.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteRejected { .. }
                | SyncError::RemoteUnreachable(_)
                | SyncError::ConcurrentFlush { .. }
                | SyncError::Bootstrap(_)
        )
    }
}
