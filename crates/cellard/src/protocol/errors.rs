//! Errors raised while decoding request envelopes.

use thiserror::Error;

use super::response::ErrorCode;

/// Decoding failures. Each one still produces a FAILURE response.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The envelope is not a well-formed list of frames.
    #[error("malformed request: {message}")]
    Protocol {
        /// What was wrong with the envelope.
        message: String,
        /// JSON error, when parsing failed.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The descriptor names an operation the daemon does not provide.
    #[error("unknown command: {command}")]
    UnknownCommand {
        /// Operation name as sent.
        command: String,
    },
}

impl DecodeError {
    /// Builds a protocol error with a custom message.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a JSON parsing failure.
    pub fn from_json_error(context: &str, source: serde_json::Error) -> Self {
        Self::Protocol {
            message: format!("{context}: {source}"),
            source: Some(source),
        }
    }

    /// Builds an unknown command error.
    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
        }
    }

    /// Error code reported to the client.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Protocol { .. } => ErrorCode::RequestError,
            Self::UnknownCommand { .. } => ErrorCode::UnknownCommand,
        }
    }
}

/// Raised when an integer on the wire is not a known [`ErrorCode`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unknown error code: {0}")]
pub struct UnknownErrorCode(pub u8);
