//! Pure selection of the ledger subscription a configuration requires.

use crate::slots::SlotStore;
use crate::types::{Modifiers, ResourceKey};
use serde::{Deserialize, Serialize};

/// The subscription set the watcher binding should hold against the ledger.
///
/// Replacing the watch always means reset-then-re-add on the ledger side;
/// [`crate::effects::LedgerEffects::set_watch`] carries that contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchMode {
    /// Crafting mode with configured slots: request notifications for each
    /// configured key individually.
    RequestKeys(Vec<ResourceKey>),
    /// Crafting mode with nothing configured: the wildcard request signal.
    RequestAll,
    /// Fuzzy matching: approximate lookups scan every key server-side, so a
    /// narrow storage subscription is not possible.
    StorageAll,
    /// Exact mode: storage notifications for each configured key only.
    StorageKeys(Vec<ResourceKey>),
}

impl WatchMode {
    /// Whether this watch delivers crafting-request notifications rather
    /// than storage quantity notifications.
    pub fn is_request_watch(&self) -> bool {
        matches!(self, Self::RequestKeys(_) | Self::RequestAll)
    }
}

/// Derive the watch the current configuration requires.
///
/// Crafting takes priority over fuzzy; fuzzy over exact. Re-evaluated on
/// every structural change and on every card install/removal.
pub fn desired_watch(store: &SlotStore, modifiers: Modifiers) -> WatchMode {
    let keys = || store.configured_keys().cloned().collect::<Vec<_>>();
    if modifiers.crafting {
        if store.configured_count() > 0 {
            WatchMode::RequestKeys(keys())
        } else {
            WatchMode::RequestAll
        }
    } else if modifiers.fuzzy {
        WatchMode::StorageAll
    } else {
        WatchMode::StorageKeys(keys())
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
    fn exact_mode_watches_configured_keys_only() {
        let store = store_with(&["iron", "coal"]);
        let watch = desired_watch(&store, Modifiers::default());
        assert_eq!(
            watch,
            WatchMode::StorageKeys(vec![ResourceKey::new("iron"), ResourceKey::new("coal")])
        );
    }

    #[test]
    fn fuzzy_widens_to_storage_wildcard() {
        let store = store_with(&["iron"]);
        let modifiers = Modifiers {
            fuzzy: true,
            crafting: false,
        };
        assert_eq!(desired_watch(&store, modifiers), WatchMode::StorageAll);
    }

    #[test]
    fn crafting_beats_fuzzy_and_narrows_when_configured() {
        let both = Modifiers {
            fuzzy: true,
            crafting: true,
        };
        let configured = store_with(&["iron"]);
        assert_eq!(
            desired_watch(&configured, both),
            WatchMode::RequestKeys(vec![ResourceKey::new("iron")])
        );
        let empty = store_with(&[]);
        assert_eq!(desired_watch(&empty, both), WatchMode::RequestAll);
        assert!(desired_watch(&empty, both).is_request_watch());
    }
}
