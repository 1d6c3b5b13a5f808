//! Threshline core: slot configuration and signal evaluation.
//!
//! This crate holds the pure heart of the system plus the effect trait
//! definitions that parameterize everything with side effects:
//!
//! - [`slots::SlotStore`]: a bounded, densely packed sequence of
//!   (resource key, threshold, comparison operator) entries. Owns the
//!   forced-sequential-configuration invariant via [`slots::SlotStore::compact`].
//! - [`logic::LogicChain`]: the AND/OR relations joining adjacent per-slot
//!   comparison outcomes, folded strictly left-to-right.
//! - [`eval`]: derives the boolean output signal from a store, a chain, and
//!   cached quantities.
//! - [`watch`]: pure selection of which ledger subscription the current
//!   configuration requires.
//! - [`effects`]: trait definitions for the external collaborators (ledger,
//!   storage, scheduler). Handlers live in `threshline-runtime` and
//!   `threshline-testkit`; this crate defines *what* can be performed, not
//!   *how*.
//!
//! Nothing in this crate performs I/O or spawns tasks; every function here is
//! deterministic given its inputs.

pub mod effects;
pub mod errors;
pub mod eval;
pub mod logic;
pub mod slots;
pub mod types;
pub mod watch;

pub use errors::{CoreError, CoreResult};
pub use eval::{evaluate, EvalInputs, EvalOutcome, QuantityCache};
pub use logic::LogicChain;
pub use slots::{CompactOutcome, SlotStore};
pub use types::{
    CapabilityCard, ComparisonOp, FuzzyScope, LogicRelation, Modifiers, RedstoneMode, ResourceKey,
};
pub use watch::{desired_watch, WatchMode};
