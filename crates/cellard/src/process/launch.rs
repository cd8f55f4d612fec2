//! Launch sequencing for the daemon process.

use std::env;
use std::sync::Arc;

use tracing::{info, warn};

use cellar_config::RuntimePaths;

use crate::bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::SocketListener;

use super::errors::LaunchError;
use super::guard::{HealthState, ProcessGuard};
use super::system::{Daemonizer, ShutdownSignal, SystemDaemonizer, SystemShutdownSignal};
use super::{FOREGROUND_ENV_VAR, PROCESS_TARGET, SHUTDOWN_TIMEOUT};

/// Launch mode for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    Background,
    /// Stay attached to the terminal.
    Foreground,
}

impl LaunchMode {
    /// Foreground when `CELLAR_FOREGROUND` is set, background otherwise.
    fn detect() -> Self {
        if env::var_os(FOREGROUND_ENV_VAR).is_some() {
            Self::Foreground
        } else {
            Self::Background
        }
    }
}

/// Process-level collaborators controlling the daemon lifecycle.
pub(crate) struct ProcessControl<D, S> {
    pub(crate) mode: LaunchMode,
    pub(crate) daemonizer: D,
    pub(crate) shutdown: S,
}

/// Service dependencies used to build the serving daemon.
pub(crate) struct ServiceDeps<L> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
}

/// Everything [`run_daemon_with`] needs.
pub(crate) struct LaunchPlan<L, D, S> {
    pub(crate) process: ProcessControl<D, S>,
    pub(crate) services: ServiceDeps<L>,
}

/// Runs the daemon with the production collaborators until a termination
/// signal arrives.
///
/// # Errors
///
/// Fails when any startup stage fails or teardown reports an error.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        process: ProcessControl {
            mode: LaunchMode::detect(),
            daemonizer: SystemDaemonizer,
            shutdown: SystemShutdownSignal::new(SHUTDOWN_TIMEOUT),
        },
        services: ServiceDeps {
            loader: SystemConfigLoader,
            reporter: Arc::new(StructuredHealthReporter::new()),
        },
    })
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, D, S>(plan: LaunchPlan<L, D, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    D: Daemonizer,
    S: ShutdownSignal,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl {
        mode,
        daemonizer,
        shutdown,
    } = process;
    let ServiceDeps { loader, reporter } = services;

    info!(target: PROCESS_TARGET, ?mode, "starting daemon runtime");
    let config = loader.load()?;
    config.daemon_socket().prepare_filesystem()?;
    let mut guard = ProcessGuard::acquire(RuntimePaths::from_config(&config)?)?;
    if mode == LaunchMode::Background {
        daemonizer.daemonize(guard.paths())?;
    }
    guard.write_pid(std::process::id())?;
    guard.write_health(HealthState::Starting)?;

    // Bind before bootstrapping so a busy endpoint fails fast.
    let listener = SocketListener::bind(config.daemon_socket())?;
    let daemon = bootstrap_with(&StaticConfigLoader::new(config), reporter)?;
    let running = daemon.start(listener)?;
    guard.write_health(HealthState::Ready)?;

    let waited = shutdown.wait();
    guard.write_health(HealthState::Stopping)?;
    let stopped = running.shutdown();
    if let Err(error) = &stopped {
        warn!(target: PROCESS_TARGET, %error, "teardown reported an error");
    }
    waited?;
    stopped?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
