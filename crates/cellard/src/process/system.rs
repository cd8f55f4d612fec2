//! Operating-system seams of the launch sequence.
//!
//! Detaching from the terminal and waiting for a stop signal are the two
//! steps that cannot run inside a test process, so each sits behind a trait
//! that the behaviour suite replaces.

use std::ffi::OsStr;
use std::io;
use std::time::Duration;

use daemonize_me::{Daemon, DaemonError};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use cellar_config::RuntimePaths;

use super::PROCESS_TARGET;

/// Signals that start an orderly shutdown.
const STOP_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Moves the process into the background.
pub trait Daemonizer: Send + Sync {
    /// Forks and detaches; only the child returns.
    fn daemonize(&self, paths: &RuntimePaths) -> Result<(), DaemonizeError>;
}

/// Blocks the launch thread until the daemon should stop.
pub trait ShutdownSignal: Send + Sync {
    /// Returns once teardown should begin.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// The fork or session setup failed.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct DaemonizeError(#[from] DaemonError);

/// Stop signal handlers could not be installed.
#[derive(Debug, Error)]
#[error("cannot install stop signal handlers: {0}")]
pub struct ShutdownError(#[from] io::Error);

/// Detaches with `daemonize-me`, using the runtime directory as the working
/// directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDaemonizer;

impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self, paths: &RuntimePaths) -> Result<(), DaemonizeError> {
        let work_dir = paths.runtime_dir();
        info!(target: PROCESS_TARGET, work_dir = %work_dir.display(), "detaching from terminal");
        Daemon::new()
            .work_dir(work_dir)
            .name(OsStr::new(env!("CARGO_PKG_NAME")))
            .start()?;
        info!(target: PROCESS_TARGET, pid = std::process::id(), "running detached");
        Ok(())
    }
}

/// Waits for the first of `SIGTERM`, `SIGINT`, `SIGQUIT` or `SIGHUP`.
#[derive(Debug, Clone, Copy)]
pub struct SystemShutdownSignal {
    grace: Duration,
}

impl SystemShutdownSignal {
    /// `grace` is the teardown budget announced when a signal arrives.
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = Signals::new(STOP_SIGNALS)?;
        let received = signals.forever().next();
        info!(
            target: PROCESS_TARGET,
            signal = received,
            grace_ms = self.grace.as_millis(),
            "stop requested, draining workers"
        );
        Ok(())
    }
}
