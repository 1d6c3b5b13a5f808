//! Ledger subscription management and the per-slot quantity cache.

use threshline_core::effects::{LedgerEffects, LedgerError};
use threshline_core::{desired_watch, FuzzyScope, Modifiers, QuantityCache, ResourceKey, SlotStore, WatchMode};
use tracing::{debug, trace};

/// What a quantity notification did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChangeOutcome {
    /// A full pull already ran this tick; skipped.
    SkippedDuplicateTick,
    /// The key is not configured; nothing to do.
    Ignored,
    /// One or more slot entries updated in place; re-evaluate.
    Updated,
    /// The watch is wildcard (fuzzy); a full pull is needed before
    /// re-evaluating.
    NeedsFullRefresh,
}

/// Holds the subscription set against the ledger and the cached quantities
/// the evaluator reads.
#[derive(Debug, Default)]
pub struct WatcherBinding {
    watch: Option<WatchMode>,
    cache: QuantityCache,
    requested_any: bool,
    last_refresh_tick: Option<u64>,
}

impl WatcherBinding {
    /// Unbound watcher with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached quantities for the evaluator.
    pub fn cache(&self) -> &QuantityCache {
        &self.cache
    }

    /// Last known "anything requested" flag (crafting mode).
    pub fn requested_any(&self) -> bool {
        self.requested_any
    }

    /// Watch currently installed on the ledger, if any.
    pub fn watch(&self) -> Option<&WatchMode> {
        self.watch.as_ref()
    }

    /// Re-derive the watch from the configuration, install it on the ledger
    /// (reset-then-re-add), and do a full pull.
    ///
    /// The full pull is mandatory: narrowing or widening the watch set
    /// changes which totals are currently known, so an assumed-zero baseline
    /// would emit wrong signals until the next notification.
    pub async fn reconfigure<L: LedgerEffects + ?Sized>(
        &mut self,
        store: &SlotStore,
        modifiers: Modifiers,
        scope: FuzzyScope,
        ledger: &L,
    ) -> Result<(), LedgerError> {
        let desired = desired_watch(store, modifiers);
        ledger.set_watch(&desired).await?;
        debug!(?desired, "watch reconfigured");
        self.watch = Some(desired);
        self.refresh_all(store, modifiers, scope, ledger).await
    }

    /// Full pull of every relevant total from the ledger.
    pub async fn refresh_all<L: LedgerEffects + ?Sized>(
        &mut self,
        store: &SlotStore,
        modifiers: Modifiers,
        scope: FuzzyScope,
        ledger: &L,
    ) -> Result<(), LedgerError> {
        self.cache.clear();
        if modifiers.crafting {
            self.requested_any = ledger.is_requested_any().await?;
            return Ok(());
        }
        let count = store.configured_count();
        for slot in 0..count {
            let Some(key) = store.key(slot) else { continue };
            let quantity = if modifiers.fuzzy {
                let matches = ledger.find_fuzzy(key, scope).await?;
                matches.iter().map(|(_, q)| q).sum()
            } else {
                ledger.quantity(key).await?
            };
            self.cache.set(slot, quantity);
        }
        Ok(())
    }

    /// Handle a storage change notification delivered by the host.
    ///
    /// Under an exact watch, only the matching slot's cache entry changes,
    /// an O(1) update with no rescan. The reported amount is an absolute
    /// total, so every notification lands in the cache; two configured keys
    /// changing in the same tick must both be recorded. Under a wildcard
    /// watch the single reported amount cannot be attributed to a slot
    /// (fuzzy aggregation), so the caller must follow up with
    /// [`WatcherBinding::refresh_all`]; that full pull reads every total at
    /// once, and the tick guard suppresses repeat pulls within the same
    /// tick.
    pub fn on_quantity_change(
        &mut self,
        store: &SlotStore,
        key: &ResourceKey,
        amount: i64,
        tick: u64,
    ) -> QuantityChangeOutcome {
        match self.watch {
            Some(WatchMode::StorageAll) => {
                if self.last_refresh_tick == Some(tick) {
                    trace!(%key, tick, "full pull already ran this tick, skipped");
                    return QuantityChangeOutcome::SkippedDuplicateTick;
                }
                self.last_refresh_tick = Some(tick);
                QuantityChangeOutcome::NeedsFullRefresh
            }
            Some(WatchMode::StorageKeys(_)) | None => {
                let count = store.configured_count();
                let mut touched = false;
                for slot in 0..count {
                    if store.key(slot) == Some(key) {
                        self.cache.set(slot, amount);
                        touched = true;
                    }
                }
                if touched {
                    trace!(%key, amount, "slot cache updated");
                    QuantityChangeOutcome::Updated
                } else {
                    QuantityChangeOutcome::Ignored
                }
            }
            // Request watches do not carry storage amounts.
            Some(WatchMode::RequestKeys(_)) | Some(WatchMode::RequestAll) => {
                QuantityChangeOutcome::Ignored
            }
        }
    }

    /// Handle a crafting-request change notification: re-read the aggregate
    /// request flag. Returns whether it moved.
    pub async fn on_request_change<L: LedgerEffects + ?Sized>(
        &mut self,
        ledger: &L,
    ) -> Result<bool, LedgerError> {
        let requested = ledger.is_requested_any().await?;
        let changed = requested != self.requested_any;
        self.requested_any = requested;
        Ok(changed)
    }

    /// Restore a best-effort quantity cache from persistence.
    pub fn restore_cache(&mut self, quantities: &[i64]) {
        self.cache.clear();
        for (slot, quantity) in quantities.iter().enumerate() {
            self.cache.set(slot, *quantity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(keys: &[&str]) -> SlotStore {
        let mut store = SlotStore::new(8);
        for (i, k) in keys.iter().enumerate() {
            store.stage_slot(i, Some(ResourceKey::new(*k))).unwrap();
        }
        store.compact();
        store
    }

    #[test]
    fn same_tick_changes_to_different_keys_both_land() {
        let store = store_with(&["iron", "coal"]);
        let mut binding = WatcherBinding::new();
        binding.watch = Some(WatchMode::StorageKeys(vec![
            ResourceKey::new("iron"),
            ResourceKey::new("coal"),
        ]));
        assert_eq!(
            binding.on_quantity_change(&store, &ResourceKey::new("iron"), 100, 7),
            QuantityChangeOutcome::Updated
        );
        assert_eq!(
            binding.on_quantity_change(&store, &ResourceKey::new("coal"), 50, 7),
            QuantityChangeOutcome::Updated
        );
        assert_eq!(binding.cache().get(0), 100);
        assert_eq!(binding.cache().get(1), 50);
    }

    #[test]
    fn repeated_exact_notification_is_idempotent() {
        let store = store_with(&["iron"]);
        let mut binding = WatcherBinding::new();
        binding.watch = Some(WatchMode::StorageKeys(vec![ResourceKey::new("iron")]));
        let key = ResourceKey::new("iron");
        binding.on_quantity_change(&store, &key, 5, 10);
        // A later absolute total in the same tick still lands.
        assert_eq!(
            binding.on_quantity_change(&store, &key, 7, 10),
            QuantityChangeOutcome::Updated
        );
        assert_eq!(binding.cache().get(0), 7);
    }

    #[test]
    fn unconfigured_key_is_ignored() {
        let store = store_with(&["iron"]);
        let mut binding = WatcherBinding::new();
        binding.watch = Some(WatchMode::StorageKeys(vec![ResourceKey::new("iron")]));
        assert_eq!(
            binding.on_quantity_change(&store, &ResourceKey::new("coal"), 5, 1),
            QuantityChangeOutcome::Ignored
        );
    }

    #[test]
    fn wildcard_watch_pulls_once_per_tick() {
        let store = store_with(&["iron"]);
        let mut binding = WatcherBinding::new();
        binding.watch = Some(WatchMode::StorageAll);
        assert_eq!(
            binding.on_quantity_change(&store, &ResourceKey::new("iron"), 5, 1),
            QuantityChangeOutcome::NeedsFullRefresh
        );
        // The pull already read every total this tick.
        assert_eq!(
            binding.on_quantity_change(&store, &ResourceKey::new("gold"), 9, 1),
            QuantityChangeOutcome::SkippedDuplicateTick
        );
        assert_eq!(
            binding.on_quantity_change(&store, &ResourceKey::new("gold"), 9, 2),
            QuantityChangeOutcome::NeedsFullRefresh
        );
    }
}
