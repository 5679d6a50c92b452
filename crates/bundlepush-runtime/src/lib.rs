mod config;
mod context;
mod lifecycle;
mod module;
mod resolver;

pub use config::{IdentityConfig, RuntimeConfig, DEFAULT_MODULE_NAME, DEFAULT_SERVER_URL};
pub use context::UpdateContext;
pub use lifecycle::LifecycleState;
pub use module::ModuleInstance;
pub use resolver::{bundle_name, ResolvedBundle};
