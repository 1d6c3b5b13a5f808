//! Unified error type for core operations.

use serde::{Deserialize, Serialize};

/// Result alias used throughout the core crate.
pub type CoreResult<T> = Result<T, CoreError>;

/// Unified error for slot, chain, and evaluation operations.
///
/// Edit handlers treat these as local rejections, never fatal failures; the
/// calling side logs and ignores rather than propagating to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum CoreError {
    /// A slot mutation referenced an index outside the fixed capacity.
    #[error("invalid slot index {index} (capacity {capacity})")]
    InvalidSlotIndex {
        /// Index that was requested.
        index: usize,
        /// Fixed capacity of the store.
        capacity: usize,
    },

    /// A relation mutation referenced an index the chain can never reach.
    #[error("invalid relation index {index} (capacity {capacity})")]
    InvalidRelationIndex {
        /// Relation index that was requested.
        index: usize,
        /// Fixed slot capacity bounding the chain at `capacity - 1`.
        capacity: usize,
    },
}

impl CoreError {
    /// Create an invalid-slot-index error.
    pub fn invalid_slot(index: usize, capacity: usize) -> Self {
        Self::InvalidSlotIndex { index, capacity }
    }

    /// Create an invalid-relation-index error.
    pub fn invalid_relation(index: usize, capacity: usize) -> Self {
        Self::InvalidRelationIndex { index, capacity }
    }
}
