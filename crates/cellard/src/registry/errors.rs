//! Error types for the database registry.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by an open database handle.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The embedded engine reported an error.
    #[error("storage engine error: {0}")]
    Engine(#[from] sled::Error),

    /// A stored key or value is not valid UTF-8.
    #[error("stored entry under key {key:?} is not valid UTF-8")]
    InvalidUtf8 {
        /// Key of the offending entry.
        key: String,
    },

    /// Moving a dropped database's directory aside failed.
    #[error("failed to move database directory '{path}': {source}")]
    Destroy {
        /// Database directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Failures reported by the [`Registry`](super::Registry).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No database with this name exists.
    #[error("database '{name}' does not exist")]
    NotFound {
        /// Requested database.
        name: String,
    },

    /// The database is referenced by an in-flight request.
    #[error("database '{name}' is in use")]
    InUse {
        /// Requested database.
        name: String,
    },

    /// The configured default database cannot be dropped.
    #[error("database '{name}' is the default database and cannot be dropped")]
    DefaultDatabase {
        /// Configured default database.
        name: String,
    },

    /// The name cannot be used as a directory under the storage root.
    #[error("invalid database name {name:?}: {reason}")]
    InvalidName {
        /// Rejected name.
        name: String,
        /// Rule the name breaks.
        reason: &'static str,
    },

    /// Opening, flushing or destroying a database failed.
    #[error("database '{name}': {source}")]
    Storage {
        /// Affected database.
        name: String,
        /// Engine failure.
        #[source]
        source: StorageError,
    },

    /// The storage root directory could not be created.
    #[error("failed to prepare storage root '{path}': {source}")]
    StorageRoot {
        /// Configured storage root.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Reading or writing the catalog file failed.
    #[error("database catalog '{path}': {message}")]
    Catalog {
        /// Catalog file.
        path: PathBuf,
        /// Failed step.
        message: String,
        /// Underlying error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Registry state is unusable after a thread panicked while holding it.
    #[error("registry state is poisoned")]
    Internal,
}

impl RegistryError {
    pub(crate) fn storage(name: impl Into<String>, source: impl Into<StorageError>) -> Self {
        Self::Storage {
            name: name.into(),
            source: source.into(),
        }
    }

    pub(crate) fn catalog(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Catalog {
            path: path.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
