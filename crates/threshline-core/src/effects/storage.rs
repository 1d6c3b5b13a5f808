//! Storage effect trait: opaque persistence for the authority's state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error type for storage operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StorageError {
    /// The key was rejected by the store.
    #[error("invalid storage key: {reason}")]
    InvalidKey {
        /// Why the key was rejected.
        reason: String,
    },
    /// Writing failed.
    #[error("storage write failed: {reason}")]
    WriteFailed {
        /// Why the write failed.
        reason: String,
    },
    /// Reading failed.
    #[error("storage read failed: {reason}")]
    ReadFailed {
        /// Why the read failed.
        reason: String,
    },
}

impl StorageError {
    /// Create a write-failure error.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }

    /// Create a read-failure error.
    pub fn read_failed(reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            reason: reason.into(),
        }
    }
}

/// Opaque keyed blob storage.
///
/// The persistence layer encodes the authority's state to a structured
/// document before handing it here; the store never interprets the bytes.
#[async_trait]
pub trait StorageEffects: Send + Sync {
    /// Store bytes under a key, replacing any previous value.
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Load the bytes stored under a key, if any.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
}
