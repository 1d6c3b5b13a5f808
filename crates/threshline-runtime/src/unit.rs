//! The authority-side emitter unit.

use crate::persist::SavedState;
use crate::watcher::{QuantityChangeOutcome, WatcherBinding};
use serde_json::Value;
use threshline_core::effects::{
    CallbackHandle, DeferredAction, LedgerEffects, LedgerError, SchedulerEffects, SchedulerError,
    StorageEffects, StorageError,
};
use threshline_core::{
    evaluate, CapabilityCard, CompactOutcome, ComparisonOp, CoreError, EvalInputs, FuzzyScope,
    LogicChain, LogicRelation, Modifiers, RedstoneMode, ResourceKey, SlotStore,
};
use threshline_sync::{
    apply_point_update, build_snapshot, AuthorityMessage, FieldValue, MirrorMessage, PointUpdate,
    Snapshot,
};
use tracing::{debug, warn};

/// Maximum installed capability cards.
const CARD_SLOTS: usize = 2;

/// Unified error for unit operations against effect handlers.
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    /// A store or chain mutation was rejected.
    #[error(transparent)]
    Core(#[from] CoreError),
    /// The ledger collaborator failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// The storage collaborator failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The scheduler collaborator failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Canonical owner of one emitter's configuration and derived signal.
///
/// All mutation happens on the host's single logic thread for this unit, so
/// there is no internal locking. Mirrors interact exclusively through
/// [`EmitterUnit::open_session`], [`EmitterUnit::handle_mirror_message`], and
/// the broadcast queue drained by [`EmitterUnit::drain_outbound`]; ledger
/// notifications arrive through the `on_*_change` entry points.
#[derive(Debug)]
pub struct EmitterUnit {
    store: SlotStore,
    chain: LogicChain,
    cards: Vec<CapabilityCard>,
    redstone_mode: RedstoneMode,
    fuzzy_scope: FuzzyScope,
    watcher: WatcherBinding,
    output: bool,
    dirty: bool,
    closed: bool,
    outbound: Vec<AuthorityMessage>,
    recount_handle: Option<CallbackHandle>,
    last_session_count: usize,
    storage_key: String,
}

impl EmitterUnit {
    /// New unconfigured unit.
    pub fn new(capacity: usize, storage_key: impl Into<String>) -> Self {
        Self {
            store: SlotStore::new(capacity),
            chain: LogicChain::new(),
            cards: Vec::new(),
            redstone_mode: RedstoneMode::default(),
            fuzzy_scope: FuzzyScope::default(),
            watcher: WatcherBinding::new(),
            output: false,
            dirty: false,
            closed: false,
            outbound: Vec::new(),
            recount_handle: None,
            last_session_count: 0,
            storage_key: storage_key.into(),
        }
    }

    /// Current output signal.
    pub fn output(&self) -> bool {
        self.output
    }

    /// Canonical slot configuration.
    pub fn store(&self) -> &SlotStore {
        &self.store
    }

    /// Canonical relation chain.
    pub fn chain(&self) -> &LogicChain {
        &self.chain
    }

    /// Effective modifier flags from the installed cards.
    pub fn modifiers(&self) -> Modifiers {
        Modifiers::from_cards(&self.cards)
    }

    /// Output polarity setting.
    pub fn redstone_mode(&self) -> RedstoneMode {
        self.redstone_mode
    }

    /// Change the output polarity and recompute the signal.
    pub fn set_redstone_mode(&mut self, mode: RedstoneMode) {
        if self.redstone_mode != mode {
            self.redstone_mode = mode;
            self.dirty = true;
            self.reevaluate();
        }
    }

    /// Change the approximate-matching breadth. Takes effect on the next
    /// full pull.
    pub fn set_fuzzy_scope(&mut self, scope: FuzzyScope) {
        if self.fuzzy_scope != scope {
            self.fuzzy_scope = scope;
            self.dirty = true;
        }
    }

    // ------------------------------------------------------------------
    // Structural mutation
    // ------------------------------------------------------------------

    /// Place or clear a slot, re-pack, and realign everything downstream:
    /// chain length, broadcasts, watch set, cached quantities, signal.
    ///
    /// The structural broadcast queues and the signal recomputes even when
    /// the ledger call fails; mirrors and the emitted output must track the
    /// canonical store, not the ledger's availability. The error still
    /// surfaces so the host can retry the subscription.
    pub async fn set_slot<L: LedgerEffects + ?Sized>(
        &mut self,
        index: usize,
        key: Option<ResourceKey>,
        ledger: &L,
    ) -> Result<CompactOutcome, UnitError> {
        let old_count = self.store.configured_count();
        let outcome = self.store.set_slot(index, key)?;
        self.chain.prune(outcome.count);
        self.dirty = true;
        self.broadcast_structure(outcome.count < old_count);
        let refreshed = self
            .watcher
            .reconfigure(&self.store, self.modifiers(), self.fuzzy_scope, ledger)
            .await;
        self.reevaluate();
        refreshed?;
        Ok(outcome)
    }

    /// Install a capability card. Returns false when the card bay is full or
    /// the card is already present.
    pub async fn install_card<L: LedgerEffects + ?Sized>(
        &mut self,
        card: CapabilityCard,
        ledger: &L,
    ) -> Result<bool, UnitError> {
        if self.cards.len() >= CARD_SLOTS || self.cards.contains(&card) {
            return Ok(false);
        }
        self.cards.push(card);
        self.cards_changed(ledger).await?;
        Ok(true)
    }

    /// Remove a capability card. Returns false when it was not installed.
    pub async fn remove_card<L: LedgerEffects + ?Sized>(
        &mut self,
        card: CapabilityCard,
        ledger: &L,
    ) -> Result<bool, UnitError> {
        let before = self.cards.len();
        self.cards.retain(|c| *c != card);
        if self.cards.len() == before {
            return Ok(false);
        }
        self.cards_changed(ledger).await?;
        Ok(true)
    }

    /// A modifier change is a full re-subscription and recompute, never just
    /// a flag flip: the watch set and the authoritative comparison both
    /// depend on the cards.
    async fn cards_changed<L: LedgerEffects + ?Sized>(
        &mut self,
        ledger: &L,
    ) -> Result<(), UnitError> {
        self.dirty = true;
        let refreshed = self
            .watcher
            .reconfigure(&self.store, self.modifiers(), self.fuzzy_scope, ledger)
            .await;
        self.reevaluate();
        refreshed?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Field mutation (authority-side entry points and mirror intents)
    // ------------------------------------------------------------------

    /// Set a slot threshold directly on the authority.
    pub fn set_threshold(&mut self, slot: usize, value: i64) -> Result<bool, UnitError> {
        self.apply_field_update(&PointUpdate::threshold(slot as u32, value))
            .map_err(UnitError::from)
    }

    /// Set a slot's comparison operator directly on the authority.
    pub fn set_operator(&mut self, slot: usize, op: ComparisonOp) -> Result<bool, UnitError> {
        self.apply_field_update(&PointUpdate::operator(slot as u32, op))
            .map_err(UnitError::from)
    }

    /// Set a chain relation directly on the authority.
    pub fn set_relation(&mut self, index: usize, relation: LogicRelation) -> Result<bool, UnitError> {
        self.apply_field_update(&PointUpdate::relation(index as u32, relation))
            .map_err(UnitError::from)
    }

    /// Apply an edit intent from a mirror.
    ///
    /// Application is immediate and unconditional, last-write-wins per field
    /// with no causality tracking; the unit marks itself dirty and broadcasts
    /// its canonical value back. An out-of-range intent is logged and
    /// ignored; a misbehaving mirror never takes the session down.
    pub fn handle_mirror_message(&mut self, message: &MirrorMessage) {
        let MirrorMessage::Update(update) = message;
        if let Err(err) = self.apply_field_update(update) {
            warn!(%err, index = update.index, "mirror update rejected");
        }
    }

    fn apply_field_update(&mut self, update: &PointUpdate) -> Result<bool, CoreError> {
        let changed = apply_point_update(&mut self.store, &mut self.chain, update)?;
        self.dirty = true;
        self.reevaluate();
        self.outbound
            .push(AuthorityMessage::Update(self.canonical(update)));
        Ok(changed)
    }

    /// Canonical value for a field after application, re-read from state.
    fn canonical(&self, update: &PointUpdate) -> PointUpdate {
        let index = update.index as usize;
        match update.value {
            FieldValue::Threshold(_) => {
                PointUpdate::threshold(update.index, self.store.threshold(index))
            }
            FieldValue::Operator(_) => {
                PointUpdate::operator(update.index, self.store.operator(index))
            }
            FieldValue::Relation(_) => {
                PointUpdate::relation(update.index, self.chain.relation(index))
            }
        }
    }

    // ------------------------------------------------------------------
    // Ledger notifications (host logic thread)
    // ------------------------------------------------------------------

    /// Storage quantity change delivered by the host.
    ///
    /// Deduplicated per tick; exact watches update one slot in place, a
    /// wildcard watch triggers a full pull before re-evaluating.
    pub async fn on_quantity_change<L: LedgerEffects + ?Sized>(
        &mut self,
        key: &ResourceKey,
        amount: i64,
        tick: u64,
        ledger: &L,
    ) -> Result<(), UnitError> {
        if self.closed {
            return Ok(());
        }
        match self.watcher.on_quantity_change(&self.store, key, amount, tick) {
            QuantityChangeOutcome::Updated => self.reevaluate(),
            QuantityChangeOutcome::NeedsFullRefresh => {
                self.watcher
                    .refresh_all(&self.store, self.modifiers(), self.fuzzy_scope, ledger)
                    .await?;
                self.reevaluate();
            }
            QuantityChangeOutcome::Ignored | QuantityChangeOutcome::SkippedDuplicateTick => {}
        }
        Ok(())
    }

    /// Crafting-request change delivered by the host.
    pub async fn on_request_change<L: LedgerEffects + ?Sized>(
        &mut self,
        ledger: &L,
    ) -> Result<(), UnitError> {
        if self.closed || !self.modifiers().crafting {
            return Ok(());
        }
        self.watcher.on_request_change(ledger).await?;
        self.reevaluate();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sessions and broadcast
    // ------------------------------------------------------------------

    /// Open a viewing session: build the full snapshot and schedule the
    /// one-tick deferred recount that catches a storage load still settling.
    ///
    /// Reopening replaces a pending recount rather than stacking a second
    /// one; the recount is a global count check, so one outstanding callback
    /// suffices.
    pub async fn open_session<S: SchedulerEffects + ?Sized>(
        &mut self,
        scheduler: &S,
    ) -> Result<Snapshot, UnitError> {
        let snapshot = build_snapshot(&self.store, &self.chain);
        self.last_session_count = snapshot.configured_count as usize;
        self.cancel_recount(scheduler).await?;
        let handle = scheduler
            .schedule_once(1, DeferredAction::RecountConfigured)
            .await?;
        self.recount_handle = Some(handle);
        Ok(snapshot)
    }

    /// Dispatch a deferred callback. Guarded by liveness: a unit closed
    /// before the callback fired treats it as a no-op.
    pub fn handle_deferred(&mut self, action: DeferredAction) {
        if self.closed {
            return;
        }
        match action {
            DeferredAction::RecountConfigured => {
                self.recount_handle = None;
                let count = self.store.configured_count();
                if count != self.last_session_count {
                    debug!(count, stale = self.last_session_count, "deferred recount moved");
                    self.broadcast_structure(count < self.last_session_count);
                }
            }
        }
    }

    /// Close the unit: cancel the outstanding callback promptly and
    /// unconditionally, then refuse further notification work.
    pub async fn close<S: SchedulerEffects + ?Sized>(
        &mut self,
        scheduler: &S,
    ) -> Result<(), UnitError> {
        self.closed = true;
        self.cancel_recount(scheduler).await
    }

    async fn cancel_recount<S: SchedulerEffects + ?Sized>(
        &mut self,
        scheduler: &S,
    ) -> Result<(), UnitError> {
        if let Some(handle) = self.recount_handle.take() {
            // Already-fired callbacks report NotFound; that is fine here.
            if let Err(err @ SchedulerError::ScheduleFailed { .. }) = scheduler.cancel(handle).await
            {
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Take the queued broadcasts for the host to fan out to sessions.
    pub fn drain_outbound(&mut self) -> Vec<AuthorityMessage> {
        std::mem::take(&mut self.outbound)
    }

    fn broadcast_structure(&mut self, shrank: bool) {
        let snapshot = build_snapshot(&self.store, &self.chain);
        self.last_session_count = snapshot.configured_count as usize;
        self.outbound.push(AuthorityMessage::Snapshot(snapshot));
        if shrank {
            self.outbound.push(AuthorityMessage::ForceRefresh);
        }
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    fn reevaluate(&mut self) {
        let modifiers = self.modifiers();
        let direct = modifiers
            .direct_output()
            .then(|| self.watcher.requested_any());
        let outcome = evaluate(&EvalInputs {
            store: &self.store,
            chain: &self.chain,
            quantities: self.watcher.cache(),
            redstone_mode: self.redstone_mode,
            direct_output: direct,
        });
        if outcome.output != self.output {
            debug!(output = outcome.output, raw = outcome.raw, "signal changed");
            self.output = outcome.output;
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Persist the current state if anything changed since the last flush.
    pub async fn flush_if_dirty<St: StorageEffects + ?Sized>(
        &mut self,
        storage: &St,
    ) -> Result<bool, UnitError> {
        if !self.dirty {
            return Ok(false);
        }
        let document = self.to_saved().encode(self.store.configured_count());
        let bytes = serde_json::to_vec(&document)
            .map_err(|e| StorageError::write_failed(e.to_string()))?;
        storage.store(&self.storage_key, bytes).await?;
        self.dirty = false;
        Ok(true)
    }

    /// Load persisted state, recovering everything parseable, then realign
    /// watchers and the signal. Returns whether a document was found.
    pub async fn load_from<St, L>(&mut self, storage: &St, ledger: &L) -> Result<bool, UnitError>
    where
        St: StorageEffects + ?Sized,
        L: LedgerEffects + ?Sized,
    {
        let Some(bytes) = storage.load(&self.storage_key).await? else {
            return Ok(false);
        };
        let document: Value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "persisted document unreadable, keeping defaults");
                return Ok(false);
            }
        };
        let saved = SavedState::decode(&document);

        let mut store = SlotStore::new(self.store.capacity());
        for (index, slot) in saved.slots.iter().enumerate() {
            if index >= store.capacity() {
                warn!(index, "persisted slot beyond capacity dropped");
                break;
            }
            store.stage_slot(index, slot.clone())?;
        }
        let count = store.compact().count;
        for (slot, threshold) in &saved.thresholds {
            if *slot >= store.capacity() {
                warn!(slot, "persisted threshold beyond capacity dropped");
                continue;
            }
            store.set_threshold(*slot, *threshold)?;
        }
        for (slot, op) in saved.operators.iter().enumerate().take(count) {
            store.set_operator(slot, *op)?;
        }
        let mut chain = LogicChain::from_relations(saved.relations.clone());
        chain.prune(count);

        self.store = store;
        self.chain = chain;
        self.cards = saved.cards.iter().copied().take(CARD_SLOTS).collect();
        self.redstone_mode = saved.redstone_mode;
        self.fuzzy_scope = saved.fuzzy_scope;
        self.watcher.restore_cache(&saved.quantities);
        if count > 0 {
            self.watcher
                .reconfigure(&self.store, self.modifiers(), self.fuzzy_scope, ledger)
                .await?;
        }
        self.reevaluate();
        self.dirty = false;
        debug!(count, "state loaded");
        Ok(true)
    }

    fn to_saved(&self) -> SavedState {
        let count = self.store.configured_count();
        let thresholds = (0..self.store.capacity())
            .filter(|slot| self.store.threshold_is_set(*slot))
            .map(|slot| (slot, self.store.threshold(slot)))
            .collect();
        SavedState {
            slots: self.store.slot_image(),
            thresholds,
            operators: (0..count).map(|slot| self.store.operator(slot)).collect(),
            relations: self.chain.relations().to_vec(),
            quantities: self.watcher.cache().snapshot().to_vec(),
            cards: self.cards.clone(),
            redstone_mode: self.redstone_mode,
            fuzzy_scope: self.fuzzy_scope,
        }
    }
}
