//! Mirror-side shadow state and per-tick reconciliation.

use crate::apply::{apply_point_update, apply_snapshot};
use crate::messages::{AuthorityMessage, PointUpdate};
use threshline_core::{ComparisonOp, LogicChain, LogicRelation, SlotStore};
use tracing::{debug, trace, warn};

/// Instruction to rebuild the edit surface, produced by
/// [`MirrorShadow::reconcile`] when the derived count skewed or a
/// force-refresh arrived.
///
/// Field values are re-read from the authority-sourced shadow, not from
/// whatever speculative edits the surface was displaying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRebuild {
    /// Rows to render: one per configured slot.
    pub count: usize,
    /// Threshold per row.
    pub thresholds: Vec<i64>,
    /// Operator per row.
    pub operators: Vec<ComparisonOp>,
    /// Relation between each row and the next.
    pub relations: Vec<LogicRelation>,
}

/// The mirror's shadow of the authority's configuration.
///
/// Holds a full `SlotStore`/`LogicChain` copy used only for rendering and
/// optimistic local echo; the authority remains the only writer of ground
/// truth. Edits queue outbound [`PointUpdate`]s that the host sends over its
/// session; authority messages land through
/// [`MirrorShadow::apply_authority`]. Dropping the shadow discards all of it,
/// matching session close.
#[derive(Debug)]
pub struct MirrorShadow {
    store: SlotStore,
    chain: LogicChain,
    last_rendered_count: Option<usize>,
    force_refresh: bool,
    outbound: Vec<PointUpdate>,
}

impl MirrorShadow {
    /// Empty shadow with the given slot capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            store: SlotStore::new(capacity),
            chain: LogicChain::new(),
            last_rendered_count: None,
            force_refresh: false,
            outbound: Vec::new(),
        }
    }

    /// Apply a message from the authority.
    ///
    /// Snapshots rebuild the shadow atomically and force a row rebuild on the
    /// next tick. Point updates land in place; an update addressing an index
    /// past capacity is dropped (never a session failure), one past the
    /// configured count but within capacity sits harmlessly in the store
    /// until the count grows to cover it.
    pub fn apply_authority(&mut self, message: &AuthorityMessage) {
        match message {
            AuthorityMessage::Snapshot(snapshot) => {
                match apply_snapshot(&mut self.store, &mut self.chain, snapshot) {
                    Ok(count) => {
                        debug!(count, "shadow rebuilt from snapshot");
                        self.force_refresh = true;
                    }
                    Err(err) => warn!(%err, "snapshot rejected"),
                }
            }
            AuthorityMessage::Update(update) => {
                if let Err(err) = apply_point_update(&mut self.store, &mut self.chain, update) {
                    warn!(%err, index = update.index, "authority update dropped");
                }
            }
            AuthorityMessage::ForceRefresh => {
                self.force_refresh = true;
            }
        }
    }

    /// Handle a threshold text edit from the editing surface.
    ///
    /// Unparseable input is silently ignored (the last valid value stays).
    /// A parsed value identical to the shadow's is ignored too, suppressing
    /// redundant traffic; otherwise the shadow updates immediately for
    /// latency hiding and the edit intent queues for the authority.
    pub fn edit_threshold_text(&mut self, slot: usize, text: &str) {
        let Ok(value) = text.trim().parse::<i64>() else {
            trace!(slot, text, "threshold input not numeric, ignored");
            return;
        };
        if self.store.threshold(slot) == value {
            return;
        }
        self.push_edit(PointUpdate::threshold(slot as u32, value));
    }

    /// Handle an operator toggle from the editing surface.
    pub fn edit_operator(&mut self, slot: usize, op: ComparisonOp) {
        if self.store.operator(slot) == op {
            return;
        }
        self.push_edit(PointUpdate::operator(slot as u32, op));
    }

    /// Handle a relation toggle from the editing surface.
    pub fn edit_relation(&mut self, index: usize, relation: LogicRelation) {
        if self.chain.relation(index) == relation {
            return;
        }
        self.push_edit(PointUpdate::relation(index as u32, relation));
    }

    fn push_edit(&mut self, update: PointUpdate) {
        match apply_point_update(&mut self.store, &mut self.chain, &update) {
            Ok(_) => self.outbound.push(update),
            // Local rejection only; the edit handler ignores the request.
            Err(err) => warn!(%err, index = update.index, "edit rejected"),
        }
    }

    /// Run once per render tick.
    ///
    /// Re-derives the configured count directly from the shadow store (never
    /// a cached counter) and compares it with the last rendered row count.
    /// On skew, or when a force-refresh flag was received, returns a rebuild
    /// plan with every field re-read from the shadow. This is what keeps the
    /// surface correct when `compact()` moved slots underneath it.
    pub fn reconcile(&mut self) -> Option<RowRebuild> {
        let count = self.store.configured_count();
        if !self.force_refresh && self.last_rendered_count == Some(count) {
            return None;
        }
        self.force_refresh = false;
        self.last_rendered_count = Some(count);
        Some(RowRebuild {
            count,
            thresholds: (0..count).map(|i| self.store.threshold(i)).collect(),
            operators: (0..count).map(|i| self.store.operator(i)).collect(),
            relations: (0..count.saturating_sub(1))
                .map(|i| self.chain.relation(i))
                .collect(),
        })
    }

    /// Take the queued edit intents for sending.
    pub fn drain_outbound(&mut self) -> Vec<PointUpdate> {
        std::mem::take(&mut self.outbound)
    }

    /// Derived configured count of the shadow.
    pub fn configured_count(&self) -> usize {
        self.store.configured_count()
    }

    /// Shadow threshold for a slot.
    pub fn threshold(&self, slot: usize) -> i64 {
        self.store.threshold(slot)
    }

    /// Shadow operator for a slot.
    pub fn operator(&self, slot: usize) -> ComparisonOp {
        self.store.operator(slot)
    }

    /// Shadow relation at a chain position.
    pub fn relation(&self, index: usize) -> LogicRelation {
        self.chain.relation(index)
    }
}
