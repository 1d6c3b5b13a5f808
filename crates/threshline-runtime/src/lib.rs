//! Threshline runtime: the authority side of the system.
//!
//! An [`unit::EmitterUnit`] owns the canonical slot configuration and derives
//! the output signal, parameterized by the effect traits in
//! `threshline-core::effects`:
//!
//! - the [`watcher::WatcherBinding`] keeps the ledger subscription aligned
//!   with the configuration and caches reported quantities;
//! - [`persist`] encodes the unit's state to a lenient structured document
//!   and recovers as much as possible from a damaged one;
//! - sessions hand mirrors a snapshot on open, apply their edit intents
//!   last-write-wins, and queue canonical broadcasts back.
//!
//! Everything here runs on the host's single logic thread per unit; the only
//! asynchrony is awaiting the effect handlers.

pub mod persist;
pub mod unit;
pub mod watcher;

pub use persist::SavedState;
pub use unit::EmitterUnit;
pub use watcher::{QuantityChangeOutcome, WatcherBinding};
