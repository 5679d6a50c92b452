use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use bundlepush_core::{Reconciliation, Result};
use bundlepush_store::{PackageStore, SettingsStore, StoreLayout};
use parking_lot::Mutex;

use crate::lifecycle::LifecycleState;

/// Storage handles and per-start state for one registered module.
#[derive(Debug)]
pub struct ModuleInstance {
    name: String,
    packages: PackageStore,
    settings: SettingsStore,
    state: Mutex<LifecycleState>,
    decision: Mutex<Option<Reconciliation>>,
    clears: AtomicUsize,
}

impl ModuleInstance {
    pub(crate) fn open(storage_root: &Path, name: &str) -> Result<Self> {
        let layout = StoreLayout::new(storage_root, name)?;
        Ok(Self {
            name: name.to_string(),
            packages: PackageStore::new(layout.clone()),
            settings: SettingsStore::new(layout),
            state: Mutex::new(LifecycleState::NoPendingUpdate),
            decision: Mutex::new(None),
            clears: AtomicUsize::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn packages(&self) -> &PackageStore {
        &self.packages
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: LifecycleState) {
        *self.state.lock() = state;
    }

    pub(crate) fn cached_decision(&self) -> Option<Reconciliation> {
        *self.decision.lock()
    }

    pub(crate) fn cache_decision(&self, decision: Option<Reconciliation>) {
        *self.decision.lock() = decision;
    }

    pub(crate) fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of full clears performed since the module was opened.
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::Relaxed)
    }
}
