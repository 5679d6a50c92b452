use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, UpdateError>;

/// Failures surfaced by the update state machine and its storage.
///
/// `MalformedData` is recoverable: callers clear updates and fall back to the
/// embedded bundle. `Unknown` marks state the system wrote itself but can no
/// longer interpret and is always propagated.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// A persisted package record exists but does not have the expected shape.
    #[error("malformed package data at {path}: {message}")]
    MalformedData { path: PathBuf, message: String },

    /// Internal consistency violation.
    #[error("{0}")]
    Unknown(String),

    /// The configured update-signing public key is unusable.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// A module was queried before it was registered.
    #[error("module '{0}' has not been initialized")]
    NotInitialized(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl UpdateError {
    pub fn malformed(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::MalformedData {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown(message.into())
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedData { .. })
    }
}

/// `with_context` for raw `io::Result`s, producing [`UpdateError::Io`].
pub trait IoResultExt<T> {
    fn io_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn io_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| UpdateError::io(context(), source))
    }
}
