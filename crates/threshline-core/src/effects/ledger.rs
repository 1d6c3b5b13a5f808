//! Ledger effect trait: the external quantity-and-request substrate.

use crate::types::{FuzzyScope, ResourceKey};
use crate::watch::WatchMode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error type for ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum LedgerError {
    /// The ledger is not reachable right now.
    #[error("ledger unavailable: {reason}")]
    Unavailable {
        /// Why the ledger could not be reached.
        reason: String,
    },
    /// The ledger rejected an operation.
    #[error("ledger operation failed: {reason}")]
    OperationFailed {
        /// Why the operation failed.
        reason: String,
    },
}

impl LedgerError {
    /// Create an unavailability error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create an operation-failure error.
    pub fn operation_failed(reason: impl Into<String>) -> Self {
        Self::OperationFailed {
            reason: reason.into(),
        }
    }
}

/// The inventory/ledger collaborator.
///
/// Change notifications travel the other way: the host delivers them to the
/// authority unit's `on_quantity_change` / `on_request_change` entry points on
/// its single logic thread. This trait covers only the pull side and the
/// subscription set.
#[async_trait]
pub trait LedgerEffects: Send + Sync {
    /// Current quantity for an exact key. Unknown keys report 0.
    async fn quantity(&self, key: &ResourceKey) -> Result<i64, LedgerError>;

    /// Approximate matches for a key, with their quantities.
    async fn find_fuzzy(
        &self,
        key: &ResourceKey,
        scope: FuzzyScope,
    ) -> Result<Vec<(ResourceKey, i64)>, LedgerError>;

    /// Whether this key is currently being requested for crafting.
    async fn is_requested(&self, key: &ResourceKey) -> Result<bool, LedgerError>;

    /// Whether anything at all is currently being requested.
    async fn is_requested_any(&self) -> Result<bool, LedgerError>;

    /// Replace the subscription set. Semantics are reset-then-re-add: the
    /// previous watch is dropped entirely before the new one takes effect.
    async fn set_watch(&self, watch: &WatchMode) -> Result<(), LedgerError>;
}
