use crate::{BinaryIdentity, PackageMetadata, Result, UpdateError};

/// Outcome of comparing the current package against the installed binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    NoPackage,
    Applicable,
    Inapplicable { binary_version_changed: bool },
}

impl Reconciliation {
    pub fn is_applicable(self) -> bool {
        matches!(self, Self::Applicable)
    }

    /// The package was built for a different native binary version and can
    /// never become applicable again.
    pub fn is_obsolete(self) -> bool {
        matches!(
            self,
            Self::Inapplicable {
                binary_version_changed: true
            }
        )
    }
}

/// A package is tied to the exact binary build it was installed against.
///
/// Requires a recorded build time equal to the binary's, and a matching
/// version label unless `test_mode` is set. A stored build time that does not
/// parse is `Unknown`.
pub fn is_package_still_applicable(
    metadata: &PackageMetadata,
    identity: &BinaryIdentity,
    test_mode: bool,
) -> Result<bool> {
    let Some(raw) = metadata.binary_modified_time.as_deref() else {
        return Ok(false);
    };
    let recorded = raw.parse::<i64>().map_err(|err| {
        UpdateError::unknown(format!(
            "error in reading binary modified date '{raw}' from package metadata: {err}"
        ))
    })?;

    Ok(recorded == identity.build_timestamp
        && (test_mode || metadata.app_version.as_deref() == Some(identity.version.as_str())))
}

pub fn has_binary_version_changed(metadata: &PackageMetadata, identity: &BinaryIdentity) -> bool {
    metadata.app_version.as_deref() != Some(identity.version.as_str())
}

pub fn reconcile(
    metadata: Option<&PackageMetadata>,
    identity: &BinaryIdentity,
    test_mode: bool,
) -> Result<Reconciliation> {
    let Some(metadata) = metadata else {
        return Ok(Reconciliation::NoPackage);
    };

    if is_package_still_applicable(metadata, identity, test_mode)? {
        return Ok(Reconciliation::Applicable);
    }

    Ok(Reconciliation::Inapplicable {
        binary_version_changed: has_binary_version_changed(metadata, identity),
    })
}
