use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bundlepush_core::{
    reconcile, BinaryIdentity, BinaryIdentityProvider, CachedIdentity, PackageMetadata,
    Reconciliation, Result, UpdateError,
};
use bundlepush_security::parse_ed25519_public_key_hex;
use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::lifecycle::LifecycleState;
use crate::module::ModuleInstance;

/// Everything the update machinery shares across a process.
///
/// Opening a context registers the configured modules and runs the restart
/// reconciliation for each of them; the registry is fixed from then on.
#[derive(Debug)]
pub struct UpdateContext {
    config: RuntimeConfig,
    identity: CachedIdentity,
    modules: HashMap<String, ModuleInstance>,
    did_update: AtomicBool,
    need_to_report_rollback: AtomicBool,
    is_running_binary_version: AtomicBool,
    test_mode: AtomicBool,
}

impl UpdateContext {
    pub fn from_config(config: RuntimeConfig) -> Result<Self> {
        let provider = config.identity_provider()?;
        Self::open(config, provider)
    }

    pub fn open(config: RuntimeConfig, provider: Box<dyn BinaryIdentityProvider>) -> Result<Self> {
        let context = Self::attach(config, provider)?;
        for name in &context.config.modules {
            let module = context.module(name)?;
            let state = context.initialize_after_restart(module)?;
            info!(module = %name, ?state, "restart reconciliation finished");
        }
        Ok(context)
    }

    /// Opens module storage without the restart pass.
    ///
    /// For tooling that inspects or edits update state from outside the
    /// running host; every module reports `NoPendingUpdate`.
    pub fn attach(config: RuntimeConfig, provider: Box<dyn BinaryIdentityProvider>) -> Result<Self> {
        config.validate()?;
        if let Some(public_key) = config.public_key.as_deref() {
            parse_ed25519_public_key_hex(public_key)
                .map_err(|err| UpdateError::InvalidPublicKey(format!("{err:#}")))?;
        }

        let identity = CachedIdentity::new(provider);
        // Binary version must be readable before any module is registered.
        let version = identity.app_version()?;

        let mut modules = HashMap::with_capacity(config.modules.len());
        for name in &config.modules {
            modules.insert(
                name.clone(),
                ModuleInstance::open(&config.storage_root, name)?,
            );
        }

        let context = Self {
            test_mode: AtomicBool::new(config.test_mode),
            config,
            identity,
            modules,
            did_update: AtomicBool::new(false),
            need_to_report_rollback: AtomicBool::new(false),
            is_running_binary_version: AtomicBool::new(false),
        };
        info!(
            %version,
            modules = context.modules.len(),
            root = %context.config.storage_root.display(),
            "opened update context"
        );
        Ok(context)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn server_url(&self) -> &str {
        &self.config.server_url
    }

    pub fn public_key(&self) -> Option<&str> {
        self.config.public_key.as_deref()
    }

    pub fn module(&self, name: &str) -> Result<&ModuleInstance> {
        self.modules
            .get(name)
            .ok_or_else(|| UpdateError::NotInitialized(name.to_string()))
    }

    pub fn module_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn startup_state(&self, name: &str) -> Result<LifecycleState> {
        Ok(self.module(name)?.state())
    }

    pub fn app_version(&self) -> Result<String> {
        self.identity.app_version()
    }

    pub fn binary_identity(&self) -> Result<BinaryIdentity> {
        self.identity.identity()
    }

    /// Replaces the binary version label for the rest of the process.
    pub fn override_app_version(&self, version: impl Into<String>) {
        self.identity.override_app_version(version);
        self.invalidate_decisions();
    }

    pub fn is_using_test_configuration(&self) -> bool {
        self.test_mode.load(Ordering::SeqCst)
    }

    pub fn set_using_test_configuration(&self, enabled: bool) {
        self.test_mode.store(enabled, Ordering::SeqCst);
        self.invalidate_decisions();
    }

    pub fn did_update(&self) -> bool {
        self.did_update.load(Ordering::SeqCst)
    }

    pub(crate) fn set_did_update(&self, value: bool) {
        self.did_update.store(value, Ordering::SeqCst);
    }

    pub fn is_running_binary_version(&self) -> bool {
        self.is_running_binary_version.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running_binary_version(&self, value: bool) {
        self.is_running_binary_version.store(value, Ordering::SeqCst);
    }

    pub fn need_to_report_rollback(&self) -> bool {
        self.need_to_report_rollback.load(Ordering::SeqCst)
    }

    pub fn set_need_to_report_rollback(&self, value: bool) {
        self.need_to_report_rollback.store(value, Ordering::SeqCst);
    }

    pub fn package_folder(&self, name: &str) -> Result<Option<PathBuf>> {
        self.module(name)?.packages().current_package_folder()
    }

    pub fn is_pending_update(&self, name: &str, hash: Option<&str>) -> Result<bool> {
        self.module(name)?.settings().is_pending_update(hash)
    }

    pub fn is_failed_update(&self, name: &str, hash: &str) -> Result<bool> {
        self.module(name)?.settings().is_failed_update(hash)
    }

    /// Drops every installed package and all update bookkeeping for a module.
    pub fn clear_updates(&self, name: &str) -> Result<()> {
        let module = self.module(name)?;
        module.packages().clear_updates()?;
        module.settings().remove_pending_update()?;
        module.settings().remove_failed_updates()?;
        module.cache_decision(Some(Reconciliation::NoPackage));
        module.record_clear();
        info!(module = %name, "cleared updates");
        Ok(())
    }

    /// Installer contract: the package becomes current and pending, not yet
    /// loading. The next restart runs it.
    pub fn install_package(
        &self,
        name: &str,
        metadata: &PackageMetadata,
        source_dir: &Path,
    ) -> Result<PathBuf> {
        let module = self.module(name)?;
        let installed = module.packages().install_package(metadata, source_dir)?;
        module
            .settings()
            .save_pending_update(&metadata.package_hash, false)?;
        module.cache_decision(None);
        Ok(installed)
    }

    /// Confirms the running update started successfully.
    pub fn notify_application_ready(&self, name: &str) -> Result<()> {
        let module = self.module(name)?;
        module.settings().remove_pending_update()?;
        if module.state() == LifecycleState::PendingFirstRun {
            module.set_state(LifecycleState::PendingConfirmed);
        }
        info!(module = %name, "application reported ready");
        Ok(())
    }

    /// Reconciliation decision for the module's current package, computed at
    /// most once per start unless storage changes underneath it.
    pub(crate) fn decision(&self, module: &ModuleInstance) -> Result<Reconciliation> {
        if let Some(decision) = module.cached_decision() {
            return Ok(decision);
        }

        let metadata = match module.packages().current_package_metadata() {
            Ok(metadata) => metadata,
            Err(err) if err.is_malformed() => {
                warn!(module = module.name(), error = %err, "package metadata is corrupted, clearing updates");
                self.clear_updates(module.name())?;
                return Ok(Reconciliation::NoPackage);
            }
            Err(err) => return Err(err),
        };

        let identity = self.identity.identity()?;
        let decision = reconcile(
            metadata.as_ref(),
            &identity,
            self.is_using_test_configuration(),
        )?;
        module.cache_decision(Some(decision));
        Ok(decision)
    }

    fn invalidate_decisions(&self) {
        for module in self.modules.values() {
            module.cache_decision(None);
        }
    }
}
