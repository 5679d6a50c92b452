use bundlepush_core::{Reconciliation, Result};
use tracing::{debug, info, warn};

use crate::context::UpdateContext;
use crate::module::ModuleInstance;

/// Where a module's pending update stands after the restart pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NoPendingUpdate,
    /// Installed update is starting for the first time; the crash tripwire
    /// is armed.
    PendingFirstRun,
    /// The running update confirmed readiness during this process. Never
    /// persisted.
    PendingConfirmed,
    /// The update was already loading on the previous start and never
    /// confirmed. It has been rolled back.
    PendingCrashed,
    /// A new native binary replaced the one the pending update targeted.
    /// The pending record is left for bundle resolution to discard.
    SupersededByBinary,
}

impl UpdateContext {
    /// Restart reconciliation for one module. Runs once, when the context
    /// opens.
    pub(crate) fn initialize_after_restart(
        &self,
        module: &ModuleInstance,
    ) -> Result<LifecycleState> {
        let state = self.reconcile_pending_update(module)?;
        module.set_state(state);
        Ok(state)
    }

    fn reconcile_pending_update(&self, module: &ModuleInstance) -> Result<LifecycleState> {
        let Some(pending) = module.settings().pending_update()? else {
            debug!(module = module.name(), "no pending update");
            return Ok(LifecycleState::NoPendingUpdate);
        };

        let decision = self.decision(module)?;
        if decision == Reconciliation::NoPackage && !module.settings().is_pending_update(None)? {
            // Corrupted metadata was cleared along with the pending record.
            return Ok(LifecycleState::NoPendingUpdate);
        }
        if decision == Reconciliation::NoPackage || decision.is_obsolete() {
            info!(
                module = module.name(),
                hash = %pending.hash,
                "skipping restart reconciliation, binary version is newer"
            );
            return Ok(LifecycleState::SupersededByBinary);
        }

        if pending.is_loading {
            warn!(
                module = module.name(),
                hash = %pending.hash,
                "update did not finish loading the last time, rolling back to a previous version"
            );
            self.set_need_to_report_rollback(true);
            self.rollback_package(module)?;
            return Ok(LifecycleState::PendingCrashed);
        }

        self.set_did_update(true);
        module.settings().save_pending_update(&pending.hash, true)?;
        info!(
            module = module.name(),
            hash = %pending.hash,
            "running update for the first time"
        );
        Ok(LifecycleState::PendingFirstRun)
    }

    /// Records the current package as failed and restores the previous one.
    ///
    /// Returns the hash that became current, if any.
    pub fn rollback_current_package(&self, name: &str) -> Result<Option<String>> {
        let module = self.module(name)?;
        self.rollback_package(module)
    }

    fn rollback_package(&self, module: &ModuleInstance) -> Result<Option<String>> {
        if let Some(failed) = module.packages().current_package_metadata()? {
            module.settings().save_failed_update(&failed)?;
        }
        let restored = module.packages().rollback_to_previous_package()?;
        module.settings().remove_pending_update()?;

        module.cache_decision(None);
        let decision = self.decision(module)?;
        info!(module = module.name(), ?restored, ?decision, "rollback complete");
        Ok(restored)
    }
}
