use std::collections::BTreeMap;
use std::fs;
use std::io;

use bundlepush_core::{IoResultExt, PackageMetadata, PendingUpdateRecord, Result, UpdateError};
use serde_json::Value;
use tracing::debug;

use crate::fs_utils::write_atomic;
use crate::layout::StoreLayout;

const PENDING_UPDATE_KEY: &str = "pendingUpdate";
const FAILED_UPDATES_KEY: &str = "failedUpdates";

type SettingsDocument = BTreeMap<String, Value>;

/// Small key-value record kept beside, not inside, the package tree.
///
/// Every mutation rewrites the whole document atomically. Records the store
/// wrote itself but cannot read back are `Unknown` errors.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    layout: StoreLayout,
}

impl SettingsStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn pending_update(&self) -> Result<Option<PendingUpdateRecord>> {
        let document = self.read_document()?;
        let Some(value) = document.get(PENDING_UPDATE_KEY) else {
            return Ok(None);
        };

        let record = serde_json::from_value(value.clone()).map_err(|err| {
            UpdateError::unknown(format!("unable to read pending update metadata: {err}"))
        })?;
        Ok(Some(record))
    }

    pub fn save_pending_update(&self, hash: &str, is_loading: bool) -> Result<()> {
        let record = PendingUpdateRecord::new(hash, is_loading);
        let value = serde_json::to_value(&record)
            .map_err(|err| UpdateError::unknown(format!("unable to encode pending update: {err}")))?;

        let mut document = self.read_document()?;
        document.insert(PENDING_UPDATE_KEY.to_string(), value);
        self.write_document(&document)?;
        debug!(module = self.layout.module(), hash, is_loading, "saved pending update");
        Ok(())
    }

    pub fn remove_pending_update(&self) -> Result<()> {
        self.remove_key(PENDING_UPDATE_KEY)
    }

    /// `hash == None` asks whether any update is pending.
    pub fn is_pending_update(&self, hash: Option<&str>) -> Result<bool> {
        Ok(self
            .pending_update()?
            .is_some_and(|record| record.matches(hash)))
    }

    pub fn failed_updates(&self) -> Result<Vec<PackageMetadata>> {
        let document = self.read_document()?;
        let Some(value) = document.get(FAILED_UPDATES_KEY) else {
            return Ok(Vec::new());
        };

        serde_json::from_value(value.clone()).map_err(|err| {
            UpdateError::unknown(format!("unable to parse failed updates information: {err}"))
        })
    }

    pub fn save_failed_update(&self, metadata: &PackageMetadata) -> Result<()> {
        let mut failed = self.failed_updates()?;
        if failed
            .iter()
            .any(|entry| entry.package_hash == metadata.package_hash)
        {
            return Ok(());
        }
        failed.push(metadata.clone());

        let value = serde_json::to_value(&failed)
            .map_err(|err| UpdateError::unknown(format!("unable to encode failed updates: {err}")))?;
        let mut document = self.read_document()?;
        document.insert(FAILED_UPDATES_KEY.to_string(), value);
        self.write_document(&document)?;
        debug!(
            module = self.layout.module(),
            hash = %metadata.package_hash,
            "recorded failed update"
        );
        Ok(())
    }

    pub fn is_failed_update(&self, hash: &str) -> Result<bool> {
        Ok(self
            .failed_updates()?
            .iter()
            .any(|entry| entry.package_hash == hash))
    }

    pub fn remove_failed_updates(&self) -> Result<()> {
        self.remove_key(FAILED_UPDATES_KEY)
    }

    fn remove_key(&self, key: &str) -> Result<()> {
        let mut document = self.read_document()?;
        if document.remove(key).is_some() {
            self.write_document(&document)?;
        }
        Ok(())
    }

    fn read_document(&self) -> Result<SettingsDocument> {
        let path = self.layout.settings_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(SettingsDocument::new()),
            Err(err) => {
                return Err(UpdateError::io(
                    format!("failed to read settings: {}", path.display()),
                    err,
                ))
            }
        };

        serde_json::from_str(&raw).map_err(|err| {
            UpdateError::unknown(format!(
                "unable to parse settings {}: {err}",
                path.display()
            ))
        })
    }

    fn write_document(&self, document: &SettingsDocument) -> Result<()> {
        let path = self.layout.settings_path();
        let payload = serde_json::to_vec_pretty(document)
            .map_err(|err| UpdateError::unknown(format!("unable to encode settings: {err}")))?;
        write_atomic(&path, &payload)
            .io_context(|| format!("failed to write settings: {}", path.display()))
    }
}
