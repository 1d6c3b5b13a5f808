//! Convergence of an arbitrarily stale mirror against authority state.

use threshline_sync::{
    apply_point_update, build_snapshot, AuthorityMessage, MirrorShadow, PointUpdate,
};
use threshline_core::{ComparisonOp, LogicChain, LogicRelation, ResourceKey, SlotStore};

fn authority() -> (SlotStore, LogicChain) {
    let mut store = SlotStore::new(16);
    for (i, key) in ["iron", "coal", "gold"].iter().enumerate() {
        store.stage_slot(i, Some(ResourceKey::new(*key))).unwrap();
    }
    store.compact();
    store.set_threshold(0, 64).unwrap();
    store.set_threshold(1, 32).unwrap();
    store.set_threshold(2, 8).unwrap();
    store.set_operator(2, ComparisonOp::LessThan).unwrap();
    let mut chain = LogicChain::new();
    chain.set_relation(0, LogicRelation::Or);
    chain.set_relation(1, LogicRelation::And);
    (store, chain)
}

#[test]
fn stale_mirror_converges_after_snapshot_and_pending_updates() {
    let (mut store, mut chain) = authority();

    // A mirror that saw some older world: junk edits, wrong count.
    let mut shadow = MirrorShadow::new(16);
    shadow.edit_threshold_text(0, "999");
    shadow.edit_relation(0, LogicRelation::Or);
    shadow.drain_outbound();

    // Session start: full snapshot, applied atomically.
    shadow.apply_authority(&AuthorityMessage::Snapshot(build_snapshot(&store, &chain)));

    // Concurrent authority-side changes broadcast as point updates that race
    // with the snapshot in arbitrary order.
    let pending = vec![
        PointUpdate::threshold(1, 48),
        PointUpdate::operator(0, ComparisonOp::LessThan),
        PointUpdate::relation(1, LogicRelation::Or),
    ];
    for update in &pending {
        apply_point_update(&mut store, &mut chain, update).unwrap();
    }
    for update in &pending {
        shadow.apply_authority(&AuthorityMessage::Update(*update));
    }

    // One reconciliation tick per pending field update is more than enough;
    // each tick re-derives the count from the shadow store.
    let mut last_rebuild = None;
    for _ in 0..pending.len() {
        if let Some(rebuild) = shadow.reconcile() {
            last_rebuild = Some(rebuild);
        }
    }

    let rebuild = last_rebuild.expect("first tick after the snapshot rebuilds rows");
    assert_eq!(rebuild.count, store.configured_count());
    for slot in 0..rebuild.count {
        assert_eq!(rebuild.thresholds[slot], store.threshold(slot));
        assert_eq!(rebuild.operators[slot], store.operator(slot));
    }
    for (index, relation) in rebuild.relations.iter().enumerate() {
        assert_eq!(*relation, chain.relation(index));
    }
}

#[test]
fn count_shrink_is_detected_by_tick_rederivation() {
    let (store, chain) = authority();
    let mut shadow = MirrorShadow::new(16);
    shadow.apply_authority(&AuthorityMessage::Snapshot(build_snapshot(&store, &chain)));
    assert_eq!(shadow.reconcile().map(|r| r.count), Some(3));

    // Authority removed the middle slot; compaction moved the tail forward.
    let mut shrunk = store.clone();
    let mut shrunk_chain = chain.clone();
    shrunk.set_slot(1, None).unwrap();
    shrunk_chain.prune(shrunk.configured_count());
    shadow.apply_authority(&AuthorityMessage::Snapshot(build_snapshot(
        &shrunk,
        &shrunk_chain,
    )));
    shadow.apply_authority(&AuthorityMessage::ForceRefresh);

    let rebuild = shadow.reconcile().expect("shrink must rebuild rows");
    assert_eq!(rebuild.count, 2);
    assert_eq!(rebuild.thresholds, vec![64, 8]);
    assert_eq!(
        rebuild.operators,
        vec![ComparisonOp::GreaterOrEqual, ComparisonOp::LessThan]
    );
}
