//! Pure snapshot construction and message application over core state.
//!
//! Both sides use these: the authority builds snapshots from its canonical
//! store and applies mirror edit intents unconditionally (last-write-wins);
//! the mirror applies snapshots atomically and authority broadcasts the same
//! way. Keeping application pure over `SlotStore`/`LogicChain` means neither
//! side can drift in how a message mutates state.

use crate::messages::{FieldValue, PointUpdate, Snapshot};
use threshline_core::{CoreResult, LogicChain, SlotStore};
use tracing::debug;

/// Build a snapshot from canonical state.
///
/// The configured count is computed here, at send time; thresholds and
/// operators are included only for indices below it.
pub fn build_snapshot(store: &SlotStore, chain: &LogicChain) -> Snapshot {
    let count = store.configured_count();
    Snapshot {
        slots: store.slot_image(),
        configured_count: count as u32,
        thresholds: (0..count).map(|i| store.threshold(i)).collect(),
        relations: chain.relations().to_vec(),
        operators: (0..count).map(|i| store.operator(i)).collect(),
    }
}

/// Rebuild state from a snapshot, atomically.
///
/// The store and chain are constructed fresh and swapped in only on success,
/// so a malformed snapshot cannot leave half-applied state behind. Slot
/// entries past the receiver's capacity are dropped. The count embedded in
/// the snapshot is not trusted: the rebuilt store is compacted and the count
/// re-derived from it. Returns the derived count.
pub fn apply_snapshot(
    store: &mut SlotStore,
    chain: &mut LogicChain,
    snapshot: &Snapshot,
) -> CoreResult<usize> {
    let mut fresh = SlotStore::new(store.capacity());
    for (index, slot) in snapshot.slots.iter().enumerate() {
        if index >= fresh.capacity() {
            debug!(index, "snapshot slot beyond capacity dropped");
            break;
        }
        fresh.stage_slot(index, slot.clone())?;
    }
    let count = fresh.compact().count;
    for (index, threshold) in snapshot.thresholds.iter().enumerate() {
        if index >= count {
            break;
        }
        fresh.set_threshold(index, *threshold)?;
    }
    for (index, op) in snapshot.operators.iter().enumerate() {
        if index >= count {
            break;
        }
        fresh.set_operator(index, *op)?;
    }
    let mut fresh_chain = LogicChain::from_relations(snapshot.relations.clone());
    fresh_chain.prune(count);

    *store = fresh;
    *chain = fresh_chain;
    Ok(count)
}

/// Apply one point update to state, last-write-wins.
///
/// Returns whether the stored value changed, letting the authority suppress
/// redundant broadcasts and persistence. Out-of-range indices surface as
/// errors for the caller to log and drop.
pub fn apply_point_update(
    store: &mut SlotStore,
    chain: &mut LogicChain,
    update: &PointUpdate,
) -> CoreResult<bool> {
    let index = update.index as usize;
    match update.value {
        FieldValue::Threshold(value) => store.set_threshold(index, value),
        FieldValue::Operator(op) => store.set_operator(index, op),
        FieldValue::Relation(relation) => {
            chain.set_relation_bounded(index, relation, store.capacity())
        }
    }
}
