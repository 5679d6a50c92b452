use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bundlepush_core::{IoResultExt, PackageMetadata, Result, UpdateError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::fs_utils::{copy_dir_recursive, remove_dir_if_exists, write_atomic};
use crate::layout::{validate_package_hash, StoreLayout};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct PackageStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_package: Option<String>,
}

/// Package directories and the current/previous pointer for one module.
#[derive(Debug, Clone)]
pub struct PackageStore {
    layout: StoreLayout,
}

impl PackageStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn package_folder(&self, hash: &str) -> PathBuf {
        self.layout.package_dir(hash)
    }

    pub fn current_package_hash(&self) -> Result<Option<String>> {
        Ok(self.read_status()?.current_package)
    }

    pub fn previous_package_hash(&self) -> Result<Option<String>> {
        Ok(self.read_status()?.previous_package)
    }

    pub fn package_metadata(&self, hash: &str) -> Result<Option<PackageMetadata>> {
        let path = self.layout.package_metadata_path(hash);
        let Some(raw) = read_optional(&path)? else {
            return Ok(None);
        };

        let metadata =
            PackageMetadata::from_json_str(&raw).map_err(|err| UpdateError::malformed(&path, err))?;
        validate_package_hash(&metadata.package_hash)
            .map_err(|err| UpdateError::malformed(&path, err))?;
        Ok(Some(metadata))
    }

    pub fn current_package_metadata(&self) -> Result<Option<PackageMetadata>> {
        match self.current_package_hash()? {
            Some(hash) => self.package_metadata(&hash),
            None => Ok(None),
        }
    }

    pub fn current_package_folder(&self) -> Result<Option<PathBuf>> {
        Ok(self
            .current_package_metadata()?
            .map(|metadata| self.package_folder(&metadata.package_hash)))
    }

    /// Bundle file of the current package, if one is installed and present.
    pub fn current_package_bundle_path(&self, bundle_file_name: &str) -> Result<Option<PathBuf>> {
        let Some(metadata) = self.current_package_metadata()? else {
            return Ok(None);
        };

        let folder = self.package_folder(&metadata.package_hash);
        let path = match metadata.relative_bundle_path.as_deref() {
            Some(relative) => folder.join(relative),
            None => folder.join(bundle_file_name),
        };
        if !path.is_file() {
            debug!(path = %path.display(), "current package bundle file is missing");
            return Ok(None);
        }
        Ok(Some(path))
    }

    /// Moves a staged package directory into place and makes it current.
    ///
    /// The previously current package is kept as the rollback target; the
    /// one before it is deleted.
    pub fn install_package(&self, metadata: &PackageMetadata, source_dir: &Path) -> Result<PathBuf> {
        let hash = metadata.package_hash.as_str();
        validate_package_hash(hash)?;

        let mut status = self.read_status()?;
        let staging = self.layout.staging_dir(hash);
        copy_dir_recursive(source_dir, &staging).io_context(|| {
            format!(
                "failed to stage package {hash} from {}",
                source_dir.display()
            )
        })?;

        let payload = metadata
            .to_json_string()
            .map_err(|err| UpdateError::unknown(format!("failed to encode package metadata: {err}")))?;
        write_atomic(&staging.join("app.json"), payload.as_bytes())
            .io_context(|| format!("failed to write metadata for package {hash}"))?;

        let destination = self.layout.package_dir(hash);
        remove_dir_if_exists(&destination)
            .io_context(|| format!("failed to remove existing package dir: {}", destination.display()))?;
        fs::rename(&staging, &destination).io_context(|| {
            format!(
                "failed to move {} to {}",
                staging.display(),
                destination.display()
            )
        })?;

        if status.current_package.as_deref() != Some(hash) {
            if let Some(previous) = status.previous_package.take() {
                if previous != hash {
                    self.remove_package_folder(&previous)?;
                }
            }
            status.previous_package = status.current_package.take();
            status.current_package = Some(hash.to_string());
        }
        self.write_status(&status)?;

        info!(
            module = self.layout.module(),
            hash,
            previous = ?status.previous_package,
            "installed package"
        );
        Ok(destination)
    }

    /// Drops the current package and restores the one installed before it.
    ///
    /// Returns the restored hash, or `None` when there was nothing to restore
    /// and the store was cleared instead.
    pub fn rollback_to_previous_package(&self) -> Result<Option<String>> {
        let status = match self.read_status() {
            Ok(status) => status,
            Err(err) if err.is_malformed() => {
                warn!(module = self.layout.module(), error = %err, "package status unreadable during rollback");
                self.clear_updates()?;
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        if let Some(current) = status.current_package.as_deref() {
            self.remove_package_folder(current)?;
        }

        let restorable = match status.previous_package {
            Some(previous) => match self.package_metadata(&previous) {
                Ok(Some(_)) => Some(previous),
                Ok(None) => None,
                Err(err) if err.is_malformed() => {
                    warn!(module = self.layout.module(), error = %err, "previous package metadata unreadable");
                    None
                }
                Err(err) => return Err(err),
            },
            None => None,
        };
        let Some(previous) = restorable else {
            info!(
                module = self.layout.module(),
                "no previous package to restore, clearing updates"
            );
            self.clear_updates()?;
            return Ok(None);
        };

        self.write_status(&PackageStatus {
            current_package: Some(previous.clone()),
            previous_package: None,
        })?;
        info!(module = self.layout.module(), hash = %previous, "rolled back to previous package");
        Ok(Some(previous))
    }

    pub fn clear_updates(&self) -> Result<()> {
        let dir = self.layout.packages_dir();
        remove_dir_if_exists(&dir)
            .io_context(|| format!("failed to clear package dir: {}", dir.display()))?;
        debug!(module = self.layout.module(), "cleared package storage");
        Ok(())
    }

    fn remove_package_folder(&self, hash: &str) -> Result<()> {
        let dir = self.layout.package_dir(hash);
        remove_dir_if_exists(&dir)
            .io_context(|| format!("failed to remove package dir: {}", dir.display()))
    }

    fn read_status(&self) -> Result<PackageStatus> {
        let path = self.layout.status_path();
        let Some(raw) = read_optional(&path)? else {
            return Ok(PackageStatus::default());
        };

        let status: PackageStatus =
            serde_json::from_str(&raw).map_err(|err| UpdateError::malformed(&path, err))?;
        for hash in [&status.current_package, &status.previous_package]
            .into_iter()
            .flatten()
        {
            validate_package_hash(hash).map_err(|err| UpdateError::malformed(&path, err))?;
        }
        Ok(status)
    }

    fn write_status(&self, status: &PackageStatus) -> Result<()> {
        let path = self.layout.status_path();
        let payload = serde_json::to_vec_pretty(status)
            .map_err(|err| UpdateError::unknown(format!("failed to encode package status: {err}")))?;
        write_atomic(&path, &payload)
            .io_context(|| format!("failed to write package status: {}", path.display()))
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(UpdateError::io(format!("failed to read {}", path.display()), err)),
    }
}
