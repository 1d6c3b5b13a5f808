//! Bounded slot configuration with forced sequential packing.
//!
//! A [`SlotStore`] is a fixed-capacity sequence of optional resource keys with
//! per-slot thresholds and comparison operators held in dense parallel arrays.
//! An explicit set bitmask distinguishes a threshold the user wrote from the
//! implicit zero, so compaction is a plain parallel-array shuffle and values
//! pre-set past the configured range survive until they are needed.
//!
//! The store's single structural invariant ("forced sequential configuration")
//! is that configured slots occupy indices `0..count` with no gaps, plus one
//! visible trailing empty slot for appending. [`SlotStore::compact`] restores
//! the invariant after any placement and is idempotent.

use crate::errors::{CoreError, CoreResult};
use crate::types::{ComparisonOp, ResourceKey};
use tracing::debug;

/// Default capacity matching the largest configuration surface the editing
/// side renders.
pub const DEFAULT_CAPACITY: usize = 256;

/// Result of a [`SlotStore::compact`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactOutcome {
    /// Configured item count after the pass.
    pub count: usize,
    /// Whether any slot content moved or was cleared.
    pub changed: bool,
}

/// Fixed-capacity ordered slot configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStore {
    capacity: usize,
    keys: Vec<Option<ResourceKey>>,
    thresholds: Vec<i64>,
    threshold_set: Vec<bool>,
    operators: Vec<ComparisonOp>,
}

impl SlotStore {
    /// Create an empty store with the given fixed capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            keys: vec![None; capacity],
            thresholds: vec![0; capacity],
            threshold_set: vec![false; capacity],
            operators: vec![ComparisonOp::default(); capacity],
        }
    }

    /// Fixed upper bound on configurable slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Key at `index`, if configured. Out-of-range reads yield `None`.
    pub fn key(&self, index: usize) -> Option<&ResourceKey> {
        self.keys.get(index).and_then(|k| k.as_ref())
    }

    /// Number of leading configured slots; the first hole terminates the
    /// count regardless of content past it.
    pub fn configured_count(&self) -> usize {
        self.keys.iter().take_while(|k| k.is_some()).count()
    }

    /// Replace slot content and restore the packing invariant.
    ///
    /// Any index within capacity may be written (the editing surface places
    /// anything anywhere); the store immediately re-packs. Out-of-range
    /// indices are rejected rather than growing capacity.
    pub fn set_slot(
        &mut self,
        index: usize,
        key: Option<ResourceKey>,
    ) -> CoreResult<CompactOutcome> {
        self.stage_slot(index, key)?;
        Ok(self.compact())
    }

    /// Write slot content without compacting.
    ///
    /// Used when applying a snapshot or a persisted image, where many slots
    /// land at once and a single [`SlotStore::compact`] runs afterwards.
    pub fn stage_slot(&mut self, index: usize, key: Option<ResourceKey>) -> CoreResult<()> {
        if index >= self.capacity {
            return Err(CoreError::invalid_slot(index, self.capacity));
        }
        self.keys[index] = key;
        Ok(())
    }

    /// Re-pack configured slots to the front, carrying each slot's threshold,
    /// set flag, and operator along with its key.
    ///
    /// After the scan, `write_index` is the new configured count; anything
    /// still occupying an index past `count` is cleared so only the single
    /// trailing buffer slot remains visible. Thresholds explicitly set past
    /// the new count are retained (they may belong to entries the user will
    /// add back); operators past the count reset to the default. Idempotent:
    /// a second pass with no intervening edit changes nothing.
    pub fn compact(&mut self) -> CompactOutcome {
        let mut write = 0;
        let mut changed = false;
        for read in 0..self.capacity {
            if self.keys[read].is_some() {
                if read != write {
                    self.keys[write] = self.keys[read].take();
                    self.thresholds[write] = self.thresholds[read];
                    self.threshold_set[write] = self.threshold_set[read];
                    self.operators[write] = self.operators[read];
                    changed = true;
                }
                write += 1;
            }
        }
        // Defensive clear past the trailing buffer slot; the forward shuffle
        // already vacated these positions unless the store was loaded from a
        // corrupt image.
        for index in (write + 1)..self.capacity {
            if self.keys[index].take().is_some() {
                changed = true;
            }
        }
        for op in &mut self.operators[write..] {
            if *op != ComparisonOp::default() {
                *op = ComparisonOp::default();
                changed = true;
            }
        }
        if changed {
            debug!(count = write, "slot store compacted");
        }
        CompactOutcome {
            count: write,
            changed,
        }
    }

    /// Threshold for `index`; unset or out-of-range entries read as 0.
    pub fn threshold(&self, index: usize) -> i64 {
        self.thresholds.get(index).copied().unwrap_or(0)
    }

    /// Whether the threshold at `index` was explicitly set.
    pub fn threshold_is_set(&self, index: usize) -> bool {
        self.threshold_set.get(index).copied().unwrap_or(false)
    }

    /// Set the threshold for `index`. Returns whether the stored value
    /// actually changed, letting callers suppress redundant persistence.
    pub fn set_threshold(&mut self, index: usize, value: i64) -> CoreResult<bool> {
        if index >= self.capacity {
            return Err(CoreError::invalid_slot(index, self.capacity));
        }
        let changed = !self.threshold_set[index] || self.thresholds[index] != value;
        self.thresholds[index] = value;
        self.threshold_set[index] = true;
        Ok(changed)
    }

    /// Comparison operator for `index`; defaults past the configured range.
    pub fn operator(&self, index: usize) -> ComparisonOp {
        self.operators.get(index).copied().unwrap_or_default()
    }

    /// Set the comparison operator for `index`. Returns whether it changed.
    pub fn set_operator(&mut self, index: usize, op: ComparisonOp) -> CoreResult<bool> {
        if index >= self.capacity {
            return Err(CoreError::invalid_slot(index, self.capacity));
        }
        let changed = self.operators[index] != op;
        self.operators[index] = op;
        Ok(changed)
    }

    /// Keys of the configured (contiguous) range, in slot order.
    pub fn configured_keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.keys
            .iter()
            .take_while(|k| k.is_some())
            .filter_map(|k| k.as_ref())
    }

    /// Ordered slot contents up to and including the first hole, the sparse
    /// terminated form the snapshot and persistence layers transmit.
    pub fn slot_image(&self) -> Vec<Option<ResourceKey>> {
        let count = self.configured_count();
        let visible = (count + 1).min(self.capacity);
        self.keys[..visible].to_vec()
    }
}

impl Default for SlotStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new(name)
    }

    #[test]
    fn count_stops_at_first_hole() {
        let mut store = SlotStore::new(8);
        store.stage_slot(0, Some(key("a"))).unwrap();
        store.stage_slot(2, Some(key("b"))).unwrap();
        assert_eq!(store.configured_count(), 1);
    }

    #[test]
    fn compact_moves_threshold_and_operator_with_key() {
        let mut store = SlotStore::new(8);
        store.stage_slot(3, Some(key("iron"))).unwrap();
        store.set_threshold(3, 64).unwrap();
        store.set_operator(3, ComparisonOp::LessThan).unwrap();

        let outcome = store.compact();
        assert_eq!(outcome.count, 1);
        assert!(outcome.changed);
        assert_eq!(store.key(0), Some(&key("iron")));
        assert_eq!(store.threshold(0), 64);
        assert_eq!(store.operator(0), ComparisonOp::LessThan);
        assert_eq!(store.key(3), None);
    }

    #[test]
    fn compact_clears_past_trailing_buffer_slot() {
        let mut store = SlotStore::new(8);
        store.stage_slot(0, Some(key("a"))).unwrap();
        store.stage_slot(1, Some(key("b"))).unwrap();
        store.compact();
        // Remove the head; the tail shifts forward and nothing survives past
        // count + 1.
        store.set_slot(0, None).unwrap();
        assert_eq!(store.configured_count(), 1);
        assert_eq!(store.key(0), Some(&key("b")));
        for i in 2..8 {
            assert_eq!(store.key(i), None);
        }
    }

    #[test]
    fn preset_thresholds_survive_shrink() {
        let mut store = SlotStore::new(8);
        store.stage_slot(0, Some(key("a"))).unwrap();
        store.stage_slot(1, Some(key("b"))).unwrap();
        store.compact();
        store.set_threshold(1, 10).unwrap();
        // Pre-set a threshold for a slot that is not configured yet.
        store.set_threshold(4, 99).unwrap();

        store.set_slot(1, None).unwrap();
        assert_eq!(store.configured_count(), 1);
        assert_eq!(store.threshold(4), 99);
        assert!(store.threshold_is_set(4));
    }

    #[test]
    fn operators_past_count_reset_to_default() {
        let mut store = SlotStore::new(8);
        store.stage_slot(0, Some(key("a"))).unwrap();
        store.set_operator(5, ComparisonOp::LessThan).unwrap();
        store.compact();
        assert_eq!(store.operator(5), ComparisonOp::GreaterOrEqual);
    }

    #[test]
    fn out_of_range_writes_are_rejected() {
        let mut store = SlotStore::new(4);
        assert_eq!(
            store.set_slot(4, Some(key("a"))),
            Err(CoreError::invalid_slot(4, 4))
        );
        assert_eq!(store.set_threshold(9, 1), Err(CoreError::invalid_slot(9, 4)));
        assert_eq!(
            store.set_operator(4, ComparisonOp::LessThan),
            Err(CoreError::invalid_slot(4, 4))
        );
    }

    #[test]
    fn slot_image_is_sparse_terminated() {
        let mut store = SlotStore::new(8);
        store.stage_slot(0, Some(key("a"))).unwrap();
        store.stage_slot(1, Some(key("b"))).unwrap();
        store.compact();
        let image = store.slot_image();
        assert_eq!(image.len(), 3);
        assert_eq!(image[2], None);
    }

    fn arb_store() -> impl Strategy<Value = SlotStore> {
        (
            proptest::collection::vec(proptest::option::of(0u8..5), 1..12),
            proptest::collection::vec((any::<i64>(), any::<bool>()), 12),
            proptest::collection::vec(any::<bool>(), 12),
        )
            .prop_map(|(slots, thresholds, ops)| {
                let mut store = SlotStore::new(12);
                for (i, slot) in slots.iter().enumerate() {
                    if let Some(n) = slot {
                        store.stage_slot(i, Some(key(&format!("k{n}")))).unwrap();
                    }
                }
                for (i, (value, set)) in thresholds.iter().enumerate() {
                    if *set {
                        store.set_threshold(i, *value).unwrap();
                    }
                }
                for (i, less) in ops.iter().enumerate() {
                    if *less {
                        store.set_operator(i, ComparisonOp::LessThan).unwrap();
                    }
                }
                store
            })
    }

    proptest! {
        /// Compaction is idempotent: a second pass with no intervening edit
        /// is a no-op on both the outcome and the full store contents.
        #[test]
        fn compact_is_idempotent(mut store in arb_store()) {
            let first = store.compact();
            let once = store.clone();
            let second = store.compact();
            prop_assert_eq!(first.count, second.count);
            prop_assert!(!second.changed);
            prop_assert_eq!(once, store);
        }

        /// After compaction the count equals the contiguous non-empty run
        /// from index 0, and no key exists at or past `count`.
        #[test]
        fn compact_packs_densely(mut store in arb_store()) {
            let outcome = store.compact();
            prop_assert_eq!(outcome.count, store.configured_count());
            for i in 0..outcome.count {
                prop_assert!(store.key(i).is_some());
            }
            for i in outcome.count..store.capacity() {
                prop_assert!(store.key(i).is_none());
            }
        }
    }
}
