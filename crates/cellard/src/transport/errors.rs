//! Error types for the client listener.

use std::fmt;
use std::io;

use thiserror::Error;

/// Why an existing Unix socket path cannot be taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
    /// Another process still accepts connections on the socket.
    LiveDaemon,
    /// The path holds something other than a socket.
    NotASocket,
}

impl fmt::Display for Occupant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LiveDaemon => "another process is serving it",
            Self::NotASocket => "it is not a unix socket",
        })
    }
}

/// Errors surfaced while binding or running the client listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The endpoint could not be resolved, inspected or bound.
    #[error("cannot bind {endpoint}: {source}")]
    Bind {
        /// Endpoint as configured.
        endpoint: String,
        /// Underlying socket or filesystem error.
        #[source]
        source: io::Error,
    },
    /// A Unix socket path is already taken.
    #[error("cannot use {path}: {occupant}")]
    PathOccupied {
        /// Socket path from the configuration.
        path: String,
        /// What holds the path.
        occupant: Occupant,
    },
    /// The accept thread could not be started.
    #[error("failed to start accept thread: {source}")]
    Start {
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("accept thread panicked")]
    ThreadPanic,
}
