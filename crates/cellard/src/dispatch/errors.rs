//! Error types for command execution.

use thiserror::Error;

use crate::protocol::{ErrorCode, Response};
use crate::registry::{RegistryError, StorageError};

/// Failures surfaced while executing a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Resolving, creating or dropping the database failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The requested key does not exist.
    #[error("key {key:?} not found")]
    KeyNotFound {
        /// Requested key.
        key: String,
    },

    /// The arguments frame does not fit the operation.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// What was wrong with the arguments.
        message: String,
    },

    /// The engine failed while serving a key-level operation.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CommandError {
    /// Creates an invalid arguments error.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    /// Error code reported to the client.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Registry(error) => match error {
                RegistryError::NotFound { .. } => ErrorCode::NotFound,
                RegistryError::InUse { .. } => ErrorCode::InUse,
                RegistryError::InvalidName { .. } | RegistryError::DefaultDatabase { .. } => {
                    ErrorCode::InvalidArguments
                }
                RegistryError::Storage { .. }
                | RegistryError::StorageRoot { .. }
                | RegistryError::Catalog { .. } => ErrorCode::StorageError,
                RegistryError::Internal => ErrorCode::InternalError,
            },
            Self::KeyNotFound { .. } => ErrorCode::NotFound,
            Self::InvalidArguments { .. } => ErrorCode::InvalidArguments,
            Self::Storage(_) => ErrorCode::StorageError,
        }
    }
}

impl From<&CommandError> for Response {
    fn from(error: &CommandError) -> Self {
        Self::failure(error.error_code(), error.to_string())
    }
}
