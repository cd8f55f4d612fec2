//! Process supervision: singleton lock, runtime snapshots, daemonisation and
//! signal-driven shutdown around the serving daemon.

use std::time::Duration;

mod errors;
mod guard;
mod launch;
mod system;

pub use self::errors::LaunchError;
pub use self::launch::{LaunchMode, run_daemon};
pub use self::system::{
    DaemonizeError, Daemonizer, ShutdownError, ShutdownSignal, SystemDaemonizer, SystemShutdownSignal,
};

#[cfg(test)]
pub(crate) use self::launch::{LaunchPlan, ProcessControl, ServiceDeps, run_daemon_with};

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
const FOREGROUND_ENV_VAR: &str = "CELLAR_FOREGROUND";
