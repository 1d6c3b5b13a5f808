//! In-memory effect handlers for deterministic tests.
//!
//! Mock handlers live here, never beside production code: tests drive a
//! [`MemoryLedger`], a [`MemoryStorage`], and a [`ManualScheduler`] and stay
//! fully deterministic. The ledger records the watch set it was given so
//! tests can assert on subscription behavior, and exposes mutation helpers
//! that return the notification the host would deliver to the unit.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use threshline_core::effects::{
    CallbackHandle, DeferredAction, LedgerEffects, LedgerError, SchedulerEffects, SchedulerError,
    StorageEffects, StorageError,
};
use threshline_core::{FuzzyScope, ResourceKey, WatchMode};
use uuid::Uuid;

/// Install a process-wide tracing subscriber honoring `RUST_LOG`, writing
/// through the test harness's captured output. Safe to call from every test;
/// only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory ledger with controllable quantities and request flags.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    quantities: Mutex<BTreeMap<ResourceKey, i64>>,
    requested: Mutex<HashSet<ResourceKey>>,
    watch: Mutex<Option<WatchMode>>,
    offline: Mutex<bool>,
}

impl MemoryLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the quantity for a key, returning the `(key, quantity)` change
    /// notification the host would deliver for it.
    pub fn set_quantity(&self, key: impl Into<ResourceKey>, quantity: i64) -> (ResourceKey, i64) {
        let key = key.into();
        self.quantities.lock().insert(key.clone(), quantity);
        (key, quantity)
    }

    /// Mark a key as requested (or not) for crafting.
    pub fn set_requested(&self, key: impl Into<ResourceKey>, requested: bool) -> ResourceKey {
        let key = key.into();
        let mut set = self.requested.lock();
        if requested {
            set.insert(key.clone());
        } else {
            set.remove(&key);
        }
        key
    }

    /// Watch set last installed via `set_watch`, if any.
    pub fn current_watch(&self) -> Option<WatchMode> {
        self.watch.lock().clone()
    }

    /// Make every ledger operation fail with an unavailability error until
    /// switched back, for failure-injection tests.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    fn check_reachable(&self) -> Result<(), LedgerError> {
        if *self.offline.lock() {
            return Err(LedgerError::unavailable("ledger offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerEffects for MemoryLedger {
    async fn quantity(&self, key: &ResourceKey) -> Result<i64, LedgerError> {
        self.check_reachable()?;
        Ok(self.quantities.lock().get(key).copied().unwrap_or(0))
    }

    async fn find_fuzzy(
        &self,
        key: &ResourceKey,
        scope: FuzzyScope,
    ) -> Result<Vec<(ResourceKey, i64)>, LedgerError> {
        self.check_reachable()?;
        let quantities = self.quantities.lock();
        let matches = quantities
            .iter()
            .filter(|(candidate, _)| match scope {
                FuzzyScope::All => true,
                FuzzyScope::Family => candidate.family() == key.family(),
            })
            .map(|(k, q)| (k.clone(), *q))
            .collect();
        Ok(matches)
    }

    async fn is_requested(&self, key: &ResourceKey) -> Result<bool, LedgerError> {
        self.check_reachable()?;
        Ok(self.requested.lock().contains(key))
    }

    async fn is_requested_any(&self) -> Result<bool, LedgerError> {
        self.check_reachable()?;
        Ok(!self.requested.lock().is_empty())
    }

    async fn set_watch(&self, watch: &WatchMode) -> Result<(), LedgerError> {
        self.check_reachable()?;
        *self.watch.lock() = Some(watch.clone());
        Ok(())
    }
}

/// In-memory keyed blob storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes stored under a key, for corruption-injection tests.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().get(key).cloned()
    }

    /// Overwrite the bytes under a key directly.
    pub fn put_raw(&self, key: &str, value: Vec<u8>) {
        self.blobs.lock().insert(key.to_string(), value);
    }
}

#[async_trait]
impl StorageEffects for MemoryStorage {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey {
                reason: "key cannot be empty".to_string(),
            });
        }
        self.blobs.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blobs.lock().get(key).cloned())
    }
}

#[derive(Debug)]
struct PendingCallback {
    handle: CallbackHandle,
    due_tick: u64,
    action: DeferredAction,
}

/// Tick-driven scheduler advanced manually by the test.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    current_tick: Mutex<u64>,
    pending: Mutex<Vec<PendingCallback>>,
}

impl ManualScheduler {
    /// Scheduler starting at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to `tick` and collect the actions that came due, in schedule
    /// order. The test dispatches them to the unit, which is where the
    /// liveness guard lives.
    pub fn advance_to(&self, tick: u64) -> Vec<DeferredAction> {
        *self.current_tick.lock() = tick;
        let mut pending = self.pending.lock();
        let (due, remaining): (Vec<_>, Vec<_>) =
            pending.drain(..).partition(|cb| cb.due_tick <= tick);
        *pending = remaining;
        due.into_iter().map(|cb| cb.action).collect()
    }

    /// Number of callbacks still outstanding.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().len()
    }
}

#[async_trait]
impl SchedulerEffects for ManualScheduler {
    async fn schedule_once(
        &self,
        delay_ticks: u64,
        action: DeferredAction,
    ) -> Result<CallbackHandle, SchedulerError> {
        let handle = Uuid::new_v4();
        let due_tick = *self.current_tick.lock() + delay_ticks;
        self.pending.lock().push(PendingCallback {
            handle,
            due_tick,
            action,
        });
        Ok(handle)
    }

    async fn cancel(&self, handle: CallbackHandle) -> Result<(), SchedulerError> {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|cb| cb.handle != handle);
        if pending.len() == before {
            return Err(SchedulerError::NotFound { handle });
        }
        Ok(())
    }
}
