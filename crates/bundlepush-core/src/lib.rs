mod error;
mod identity;
mod metadata;
mod reconcile;

pub use error::{IoResultExt, Result, UpdateError};
pub use identity::{
    BinaryIdentity, BinaryIdentityProvider, CachedIdentity, ResourceIdentityProvider,
    StaticIdentityProvider,
};
pub use metadata::{PackageMetadata, PendingUpdateRecord};
pub use reconcile::{
    has_binary_version_changed, is_package_still_applicable, reconcile, Reconciliation,
};
