use std::path::PathBuf;

use bundlepush_core::Result;
use tracing::{info, warn};

use crate::context::UpdateContext;

/// Bundle the host should execute for a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBundle {
    /// Filesystem path of a package bundle, or the embedded bundle URL.
    pub path: String,
    pub is_binary: bool,
}

impl ResolvedBundle {
    fn binary(url: String) -> Self {
        Self {
            path: url,
            is_binary: true,
        }
    }

    fn package(path: PathBuf) -> Self {
        Self {
            path: path.display().to_string(),
            is_binary: false,
        }
    }
}

pub fn bundle_name(module: &str) -> String {
    format!("{module}.bundle")
}

impl UpdateContext {
    pub fn binary_bundle_url(&self, module: &str) -> String {
        format!("{}{}", self.config().embedded_bundle_prefix, bundle_name(module))
    }

    pub fn resolve_bundle_for_module(&self, name: &str) -> Result<ResolvedBundle> {
        let module = self.module(name)?;
        let binary = ResolvedBundle::binary(self.binary_bundle_url(name));

        let package_path = match module
            .packages()
            .current_package_bundle_path(&bundle_name(name))
        {
            Ok(path) => path,
            Err(err) if err.is_malformed() => {
                warn!(module = %name, error = %err, "package metadata is corrupted, clearing updates");
                self.clear_updates(name)?;
                None
            }
            Err(err) => return Err(err),
        };

        let Some(package_path) = package_path else {
            info!(module = %name, url = %binary.path, "loading embedded bundle");
            self.set_running_binary_version(true);
            return Ok(binary);
        };

        let decision = self.decision(module)?;
        if decision.is_applicable() {
            let resolved = ResolvedBundle::package(package_path);
            info!(module = %name, path = %resolved.path, "loading update bundle");
            self.set_running_binary_version(false);
            return Ok(resolved);
        }

        // The installed binary is newer than the package.
        self.set_did_update(false);
        if decision.is_obsolete() {
            self.clear_updates(name)?;
        }
        info!(module = %name, url = %binary.path, ?decision, "loading embedded bundle");
        self.set_running_binary_version(true);
        Ok(binary)
    }
}
