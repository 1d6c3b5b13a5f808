//! Scheduler effect trait: one-shot deferred callbacks from the host tick loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle to a scheduled callback, used for cancellation.
pub type CallbackHandle = Uuid;

/// What a deferred callback should do when it fires.
///
/// The scheduler never calls back into the unit directly; it hands the due
/// action back to the host, which dispatches it on the unit's logic thread.
/// A unit that was closed in the meantime treats any delivered action as a
/// no-op, so firing against a dead unit is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferredAction {
    /// Recompute the configured count and re-broadcast if it moved.
    /// Scheduled one tick after a session opens so a storage load can finish
    /// populating slots first.
    RecountConfigured,
}

/// Error type for scheduler operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SchedulerError {
    /// The handle did not name an outstanding callback.
    #[error("callback not found: {handle}")]
    NotFound {
        /// Handle that was requested.
        handle: CallbackHandle,
    },
    /// Scheduling failed.
    #[error("scheduling failed: {reason}")]
    ScheduleFailed {
        /// Why scheduling failed.
        reason: String,
    },
}

/// The host's tick-scheduling facility.
#[async_trait]
pub trait SchedulerEffects: Send + Sync {
    /// Schedule `action` to fire `delay_ticks` ticks from now. Returns a
    /// handle the owner must cancel if it closes first.
    async fn schedule_once(
        &self,
        delay_ticks: u64,
        action: DeferredAction,
    ) -> Result<CallbackHandle, SchedulerError>;

    /// Cancel an outstanding callback. Cancelling an already-fired handle is
    /// not an error at the call site; handlers may report `NotFound`, which
    /// callers ignore during teardown.
    async fn cancel(&self, handle: CallbackHandle) -> Result<(), SchedulerError>;
}
