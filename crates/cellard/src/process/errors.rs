//! Error surface for launching and supervising the daemon process.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTimeError;

use nix::errno::Errno;
use ortho_config::OrthoError;
use thiserror::Error;

use cellar_config::{RuntimePathsError, SocketPreparationError};

use crate::bootstrap::{BootstrapError, ServeError};
use crate::transport::ListenerError;

use super::system::{DaemonizeError, ShutdownError};

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Preparing the socket directory failed.
    #[error("failed to prepare daemon socket: {source}")]
    Socket {
        /// Underlying filesystem error.
        #[source]
        source: SocketPreparationError,
    },
    /// Runtime artefact paths could not be derived.
    #[error(transparent)]
    RuntimePaths(#[from] RuntimePathsError),
    /// Lock file creation failed.
    #[error("failed to create lock file '{path}': {source}")]
    LockCreate {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A live daemon already holds the lock.
    #[error("daemon already running with pid {pid}")]
    AlreadyRunning {
        /// PID recorded by the running daemon.
        pid: u32,
    },
    /// Removing a stale lock or pid file failed.
    #[error("failed to remove stale file '{path}': {source}")]
    Cleanup {
        /// Path that could not be removed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the pid or health file failed.
    #[error("failed to write runtime file '{path}': {source}")]
    RuntimeWrite {
        /// File being written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Serialising the health snapshot failed.
    #[error("failed to serialise health snapshot: {0}")]
    HealthSerialise(#[from] serde_json::Error),
    /// Obtaining the current timestamp failed.
    #[error("failed to read system time: {0}")]
    Clock(#[from] SystemTimeError),
    /// Checking the pid recorded by a previous daemon failed.
    #[error("failed to check existing process {pid}: {source}")]
    CheckProcess {
        /// PID that could not be checked.
        pid: u32,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Health updates were attempted before writing the pid file.
    #[error("pid must be written before updating health state")]
    MissingPid,
    /// Daemonisation failed.
    #[error("failed to daemonise: {0}")]
    Daemonize(#[from] DaemonizeError),
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {0}")]
    Shutdown(#[from] ShutdownError),
    /// Bootstrapping the daemon failed.
    #[error("daemon bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),
    /// Binding the client endpoint failed.
    #[error("daemon socket listener failed: {0}")]
    Listener(#[from] ListenerError),
    /// Starting or stopping the request path failed.
    #[error("daemon serving failed: {0}")]
    Serve(#[from] ServeError),
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<SocketPreparationError> for LaunchError {
    fn from(source: SocketPreparationError) -> Self {
        Self::Socket { source }
    }
}
