use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use crate::{Result, UpdateError};

/// Version label and build timestamp of the installed native binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryIdentity {
    pub version: String,
    pub build_timestamp: i64,
}

/// Source of the installed binary's identity.
///
/// Production code reads host build metadata; tests use
/// [`StaticIdentityProvider`].
pub trait BinaryIdentityProvider: Send + Sync {
    fn app_version(&self) -> Result<String>;

    fn build_timestamp(&self) -> Result<i64>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentityProvider {
    identity: BinaryIdentity,
}

impl StaticIdentityProvider {
    pub fn new(version: impl Into<String>, build_timestamp: i64) -> Self {
        Self {
            identity: BinaryIdentity {
                version: version.into(),
                build_timestamp,
            },
        }
    }
}

impl BinaryIdentityProvider for StaticIdentityProvider {
    fn app_version(&self) -> Result<String> {
        Ok(self.identity.version.clone())
    }

    fn build_timestamp(&self) -> Result<i64> {
        Ok(self.identity.build_timestamp)
    }
}

#[derive(Debug, Deserialize)]
struct HostResources {
    version: Option<String>,
    build_time: Option<String>,
}

/// Reads identity from the TOML resources file emitted by the host build.
///
/// The build time is written as a quoted string (`"\"1712345678901\""`) so
/// it survives resource tooling that would otherwise coerce it to a float.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentityProvider {
    path: PathBuf,
}

impl ResourceIdentityProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HostResources> {
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            UpdateError::unknown(format!(
                "unable to read binary resources {}: {err}",
                self.path.display()
            ))
        })?;
        toml::from_str(&raw).map_err(|err| {
            UpdateError::unknown(format!(
                "unable to parse binary resources {}: {err}",
                self.path.display()
            ))
        })
    }
}

impl BinaryIdentityProvider for ResourceIdentityProvider {
    fn app_version(&self) -> Result<String> {
        self.load()?
            .version
            .filter(|version| !version.trim().is_empty())
            .ok_or_else(|| {
                UpdateError::unknown(format!(
                    "unable to get binary version from {}",
                    self.path.display()
                ))
            })
    }

    fn build_timestamp(&self) -> Result<i64> {
        let raw = self.load()?.build_time.ok_or_else(|| {
            UpdateError::unknown("error in getting binary resources modified time")
        })?;
        parse_build_timestamp(&raw)
    }
}

pub(crate) fn parse_build_timestamp(raw: &str) -> Result<i64> {
    let unquoted = raw.replace('"', "");
    unquoted.trim().parse::<i64>().map_err(|err| {
        UpdateError::unknown(format!(
            "error in getting binary resources modified time '{raw}': {err}"
        ))
    })
}

/// Memoizes a provider's answers for the lifetime of the process.
///
/// The version may be replaced at runtime through
/// [`CachedIdentity::override_app_version`]; the build timestamp never changes
/// once read.
pub struct CachedIdentity {
    provider: Box<dyn BinaryIdentityProvider>,
    version: RwLock<Option<String>>,
    build_timestamp: RwLock<Option<i64>>,
}

impl CachedIdentity {
    pub fn new(provider: Box<dyn BinaryIdentityProvider>) -> Self {
        Self {
            provider,
            version: RwLock::new(None),
            build_timestamp: RwLock::new(None),
        }
    }

    pub fn app_version(&self) -> Result<String> {
        if let Some(version) = self.version.read().as_ref() {
            return Ok(version.clone());
        }

        let version = self.provider.app_version()?;
        debug!(%version, "read binary version");
        *self.version.write() = Some(version.clone());
        Ok(version)
    }

    pub fn build_timestamp(&self) -> Result<i64> {
        if let Some(timestamp) = *self.build_timestamp.read() {
            return Ok(timestamp);
        }

        let timestamp = self.provider.build_timestamp()?;
        debug!(timestamp, "read binary build timestamp");
        *self.build_timestamp.write() = Some(timestamp);
        Ok(timestamp)
    }

    pub fn identity(&self) -> Result<BinaryIdentity> {
        Ok(BinaryIdentity {
            version: self.app_version()?,
            build_timestamp: self.build_timestamp()?,
        })
    }

    pub fn override_app_version(&self, version: impl Into<String>) {
        *self.version.write() = Some(version.into());
    }
}

impl std::fmt::Debug for CachedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedIdentity")
            .field("version", &*self.version.read())
            .field("build_timestamp", &*self.build_timestamp.read())
            .finish_non_exhaustive()
    }
}
