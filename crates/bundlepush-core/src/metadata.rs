use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata record written next to a downloaded package's files.
///
/// Only the identity fields are interpreted here; everything else the
/// installer recorded is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    pub package_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_modified_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_bundle_path: Option<String>,
    /// Installer fields such as `label`, `description` and `isMandatory`,
    /// kept as written.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PackageMetadata {
    pub fn new(package_hash: impl Into<String>) -> Self {
        Self {
            package_hash: package_hash.into(),
            app_version: None,
            binary_modified_time: None,
            relative_bundle_path: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_binary(mut self, app_version: impl Into<String>, binary_modified_time: i64) -> Self {
        self.app_version = Some(app_version.into());
        self.binary_modified_time = Some(binary_modified_time.to_string());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.extra
            .insert("label".to_string(), Value::String(label.into()));
        self
    }

    pub fn with_mandatory(mut self, is_mandatory: bool) -> Self {
        self.extra
            .insert("isMandatory".to_string(), Value::Bool(is_mandatory));
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.extra.get("label").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.extra.get("description").and_then(Value::as_str)
    }

    pub fn is_mandatory(&self) -> bool {
        self.extra
            .get("isMandatory")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Marker for an installed update that the running app has not confirmed.
///
/// `is_loading == true` means a start already tried this update. Seeing it
/// again on the next start means that start never reached confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdateRecord {
    pub hash: String,
    pub is_loading: bool,
}

impl PendingUpdateRecord {
    pub fn new(hash: impl Into<String>, is_loading: bool) -> Self {
        Self {
            hash: hash.into(),
            is_loading,
        }
    }

    pub fn matches(&self, hash: Option<&str>) -> bool {
        hash.map_or(true, |hash| self.hash == hash)
    }
}
