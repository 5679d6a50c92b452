use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use bundlepush_core::{
    BinaryIdentityProvider, ResourceIdentityProvider, Result, StaticIdentityProvider, UpdateError,
};
use bundlepush_store::validate_module_name;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER_URL: &str = "https://codepush.appcenter.ms/";
pub const DEFAULT_MODULE_NAME: &str = "index.android";

/// Runtime configuration for an update context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Directory holding every module's packages and settings.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Update service endpoint, handed through to the download layer.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Prefix of the bundle embedded in the binary, e.g. `assets://`.
    #[serde(default = "default_embedded_bundle_prefix")]
    pub embedded_bundle_prefix: String,

    /// Hex-encoded Ed25519 key for signed updates.
    #[serde(default)]
    pub public_key: Option<String>,

    /// Ignore the binary version label when matching packages.
    #[serde(default)]
    pub test_mode: bool,

    /// Modules registered when the context opens.
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,

    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Where the installed binary's identity comes from.
///
/// `resources_path` wins when set; otherwise both inline fields are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityConfig {
    #[serde(default)]
    pub resources_path: Option<PathBuf>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub build_time: Option<i64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            server_url: default_server_url(),
            embedded_bundle_prefix: default_embedded_bundle_prefix(),
            public_key: None,
            test_mode: false,
            modules: default_modules(),
            identity: IdentityConfig::default(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from(".bundlepush")
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_embedded_bundle_prefix() -> String {
    "assets://".to_string()
}

fn default_modules() -> Vec<String> {
    vec![DEFAULT_MODULE_NAME.to_string()]
}

impl RuntimeConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)
            .map_err(|err| UpdateError::Config(format!("failed to parse config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            UpdateError::io(format!("failed to read config {}", path.display()), err)
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|err| UpdateError::Config(format!("failed to render config: {err}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.modules.is_empty() {
            return Err(UpdateError::Config(
                "at least one module must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.modules.len());
        for module in &self.modules {
            validate_module_name(module)?;
            if !seen.insert(module.as_str()) {
                return Err(UpdateError::Config(format!(
                    "duplicate module '{module}' in config"
                )));
            }
        }

        if self.embedded_bundle_prefix.is_empty() {
            return Err(UpdateError::Config(
                "embedded_bundle_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn identity_provider(&self) -> Result<Box<dyn BinaryIdentityProvider>> {
        if let Some(path) = &self.identity.resources_path {
            return Ok(Box::new(ResourceIdentityProvider::new(path)));
        }

        match (&self.identity.version, self.identity.build_time) {
            (Some(version), Some(build_time)) => {
                Ok(Box::new(StaticIdentityProvider::new(version, build_time)))
            }
            _ => Err(UpdateError::Config(
                "identity needs resources_path, or both version and build_time".to_string(),
            )),
        }
    }
}
