use std::path::{Path, PathBuf};

use bundlepush_core::{Result, UpdateError};

/// On-disk layout for one module's storage namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
    module: String,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>, module: &str) -> Result<Self> {
        validate_module_name(module)?;
        Ok(Self {
            root: root.into(),
            module: module.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn module_dir(&self) -> PathBuf {
        self.root.join(&self.module)
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.module_dir().join("packages")
    }

    pub fn status_path(&self) -> PathBuf {
        self.packages_dir().join("status.json")
    }

    pub fn package_dir(&self, hash: &str) -> PathBuf {
        self.packages_dir().join(hash)
    }

    pub fn package_metadata_path(&self, hash: &str) -> PathBuf {
        self.package_dir(hash).join("app.json")
    }

    pub fn staging_dir(&self, hash: &str) -> PathBuf {
        self.packages_dir().join(format!(".staging-{hash}"))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.module_dir().join("settings.json")
    }
}

pub fn validate_module_name(name: &str) -> Result<()> {
    validate_path_component("module name", name)
}

pub fn validate_package_hash(hash: &str) -> Result<()> {
    validate_path_component("package hash", hash)
}

fn validate_path_component(kind: &str, value: &str) -> Result<()> {
    let invalid = value.is_empty()
        || value.starts_with('.')
        || value.contains(&['/', '\\', '\0'][..]);
    if invalid {
        return Err(UpdateError::Config(format!("invalid {kind}: '{value}'")));
    }
    Ok(())
}
