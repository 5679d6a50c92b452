mod fs_utils;
mod layout;
mod packages;
mod settings;

pub use fs_utils::{copy_dir_recursive, remove_dir_if_exists, remove_file_if_exists, write_atomic};
pub use layout::{validate_module_name, validate_package_hash, StoreLayout};
pub use packages::PackageStore;
pub use settings::SettingsStore;
