//! Signal derivation from a slot configuration and cached quantities.

use crate::logic::LogicChain;
use crate::slots::SlotStore;
use crate::types::RedstoneMode;
use serde::{Deserialize, Serialize};

/// Per-slot quantity cache fed by the watcher binding.
///
/// Source of truth is the external ledger; this is only the last reported
/// view. Slots the ledger has not reported yet read as 0.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuantityCache {
    counts: Vec<i64>,
}

impl QuantityCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity for `slot`, 0 when unknown.
    pub fn get(&self, slot: usize) -> i64 {
        self.counts.get(slot).copied().unwrap_or(0)
    }

    /// Record the quantity for one slot, growing the cache as needed.
    pub fn set(&mut self, slot: usize, quantity: i64) {
        if self.counts.len() <= slot {
            self.counts.resize(slot + 1, 0);
        }
        self.counts[slot] = quantity;
    }

    /// Forget everything; the next full pull repopulates.
    pub fn clear(&mut self) {
        self.counts.clear();
    }

    /// Last reported quantities, best effort, for persistence.
    pub fn snapshot(&self) -> &[i64] {
        &self.counts
    }
}

/// Everything one evaluation reads.
#[derive(Debug, Clone, Copy)]
pub struct EvalInputs<'a> {
    /// Slot configuration (already compacted).
    pub store: &'a SlotStore,
    /// Relation chain joining adjacent slots.
    pub chain: &'a LogicChain,
    /// Cached per-slot quantities.
    pub quantities: &'a QuantityCache,
    /// Output polarity.
    pub redstone_mode: RedstoneMode,
    /// When set, the comparison machinery is bypassed entirely and the signal
    /// is this external "anything requested" flag (crafting mode).
    pub direct_output: Option<bool>,
}

/// Result of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOutcome {
    /// Folded result before polarity, or the direct-output flag.
    pub raw: bool,
    /// Signal actually emitted.
    pub output: bool,
}

/// Derive the output signal.
///
/// Direct output (crafting mode) short-circuits everything, polarity
/// included. Otherwise: an unconfigured emitter folds to false, each
/// configured slot compares its cached quantity against its threshold (a
/// missing key counts as unmet), the chain folds the outcomes left-to-right,
/// and polarity maps the fold onto the wire. With a single slot no relation
/// is consulted.
pub fn evaluate(inputs: &EvalInputs<'_>) -> EvalOutcome {
    if let Some(requested) = inputs.direct_output {
        return EvalOutcome {
            raw: requested,
            output: requested,
        };
    }

    let count = inputs.store.configured_count();
    let raw = if count == 0 {
        false
    } else {
        let mut results = Vec::with_capacity(count);
        for slot in 0..count {
            let met = match inputs.store.key(slot) {
                Some(_) => inputs
                    .store
                    .operator(slot)
                    .is_met(inputs.quantities.get(slot), inputs.store.threshold(slot)),
                None => false,
            };
            results.push(met);
        }
        inputs.chain.fold(&results)
    };

    let output = match inputs.redstone_mode {
        RedstoneMode::HighSignal => raw,
        RedstoneMode::LowSignal => !raw,
    };
    EvalOutcome { raw, output }
}
