//! Failures of cross-window sync: the shared store underneath, the
//! in-process channels, and messages or snapshots that cannot be read.

use corepos_store::DbError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The local store failed.
    #[error("shared storage: {0}")]
    Storage(#[from] DbError),

    // =========================================================================
    // Channel Errors
    // =========================================================================
    /// Every other end of the channel is gone.
    #[error("no window is listening on '{0}'")]
    ChannelClosed(String),

    /// A receiver fell behind and messages were dropped.
    #[error("listener fell {0} messages behind")]
    Lagged(u64),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    #[error("unreadable sync message: {0}")]
    InvalidMessage(String),

    /// A message or snapshot written by a newer schema.
    #[error("{what} version {found} is newer than this register understands ({supported})")]
    UnsupportedVersion {
        what: &'static str,
        found: u32,
        supported: u32,
    },

    #[error("cannot encode sync payload: {0}")]
    SerializationFailed(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl SyncError {
    /// Busy or briefly unreachable storage and lagged receivers are worth
    /// another try. A bad message stays bad.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Storage(db) => matches!(
                db,
                DbError::PoolExhausted | DbError::ConnectionFailed(_)
            ),
            SyncError::Lagged(_) => true,
            SyncError::ChannelClosed(_)
            | SyncError::InvalidMessage(_)
            | SyncError::UnsupportedVersion { .. }
            | SyncError::SerializationFailed(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_categories() {
        assert!(SyncError::Storage(DbError::PoolExhausted).is_retryable());
        assert!(!SyncError::Storage(DbError::invalid_data("k", "bad")).is_retryable());
        assert!(SyncError::Lagged(3).is_retryable());
        assert!(!SyncError::UnsupportedVersion { what: "message", found: 9, supported: 1 }
            .is_retryable());
    }

    #[test]
    fn test_version_message() {
        let err = SyncError::UnsupportedVersion { what: "snapshot", found: 2, supported: 1 };
        assert_eq!(
            err.to_string(),
            "snapshot version 2 is newer than this register understands (1)"
        );
    }
}
