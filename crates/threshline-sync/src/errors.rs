//! Error type for sync protocol operations.

use serde::{Deserialize, Serialize};

/// Result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Unified sync protocol error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SyncError {
    /// A message failed to encode or decode.
    #[error("codec error: {reason}")]
    Codec {
        /// What the codec reported.
        reason: String,
    },
    /// A message referenced state the receiving side cannot hold.
    #[error("message rejected: {reason}")]
    Rejected {
        /// Why the message was rejected.
        reason: String,
    },
}

impl SyncError {
    /// Create a codec error.
    pub fn codec(reason: impl std::fmt::Display) -> Self {
        Self::Codec {
            reason: reason.to_string(),
        }
    }

    /// Create a rejection error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}
