//! Effect trait definitions for the external collaborators.
//!
//! This module defines *what* side effects the system performs; handlers
//! define *how*. Production hosts implement these against their inventory
//! network, storage, and tick loop; `threshline-testkit` provides in-memory
//! handlers for deterministic tests. All runtime code is parameterized by
//! these traits, never by concrete handlers.

pub mod ledger;
pub mod scheduler;
pub mod storage;

pub use ledger::{LedgerEffects, LedgerError};
pub use scheduler::{CallbackHandle, DeferredAction, SchedulerEffects, SchedulerError};
pub use storage::{StorageEffects, StorageError};
