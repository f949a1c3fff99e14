//! Error types for the reconciliation engine

use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Errors from user actions and sync sweeps
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Toggle or delete of an id the local store does not hold
    #[error("Todo not found: {0}")]
    NotFound(String),

    /// A remote-only operation was requested while offline
    #[error("Offline: the remote API is unreachable until connectivity returns")]
    Offline,
}

impl SyncError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
            || matches!(self, SyncError::Storage(e) if e.is_not_found())
    }
}

/// Result type for engine operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;
