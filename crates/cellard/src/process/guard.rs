//! Singleton lock plus the pid and health files published beside it.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::Serialize;
use tracing::{info, warn};

use cellar_config::RuntimePaths;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use crate::files::atomic_write;

/// Lifecycle stage published in the health file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum HealthState {
    Starting,
    Ready,
    Stopping,
}

#[derive(Debug, Serialize)]
struct HealthSnapshot {
    status: HealthState,
    pid: u32,
    timestamp: u64,
}

/// Holds the lock file for the lifetime of the daemon and removes every
/// runtime artefact on drop.
#[derive(Debug)]
pub(crate) struct ProcessGuard {
    paths: RuntimePaths,
    _lock: File,
    pid: Option<u32>,
}

impl ProcessGuard {
    pub(crate) fn acquire(paths: RuntimePaths) -> Result<Self, LaunchError> {
        let lock = acquire_lock(&paths)?;
        Ok(Self {
            paths,
            _lock: lock,
            pid: None,
        })
    }

    pub(crate) fn paths(&self) -> &RuntimePaths {
        &self.paths
    }

    pub(crate) fn write_pid(&mut self, pid: u32) -> Result<(), LaunchError> {
        let path = self.paths.pid_path();
        atomic_write(path, format!("{pid}\n").as_bytes()).map_err(|source| {
            LaunchError::RuntimeWrite {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.pid = Some(pid);
        info!(target: PROCESS_TARGET, pid, file = %path.display(), "pid file written");
        Ok(())
    }

    pub(crate) fn write_health(&self, status: HealthState) -> Result<(), LaunchError> {
        let pid = self.pid.ok_or(LaunchError::MissingPid)?;
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let mut payload = serde_json::to_vec(&HealthSnapshot {
            status,
            pid,
            timestamp,
        })?;
        payload.push(b'\n');

        let path = self.paths.health_path();
        atomic_write(path, &payload).map_err(|source| LaunchError::RuntimeWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!(target: PROCESS_TARGET, ?status, file = %path.display(), "health snapshot updated");
        Ok(())
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        for path in [
            self.paths.health_path(),
            self.paths.pid_path(),
            self.paths.lock_path(),
        ] {
            if let Err(error) = remove_if_present(path) {
                warn!(target: PROCESS_TARGET, file = %path.display(), %error, "failed to remove runtime file");
            }
        }
    }
}

fn acquire_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    match options.open(paths.lock_path()) {
        Ok(file) => {
            info!(target: PROCESS_TARGET, file = %paths.lock_path().display(), "acquired daemon lock");
            Ok(file)
        }
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => reclaim_stale_lock(paths),
        Err(source) => Err(LaunchError::LockCreate {
            path: paths.lock_path().to_path_buf(),
            source,
        }),
    }
}

/// Takes over a lock left behind by a daemon that is no longer running.
fn reclaim_stale_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    if let Some(pid) = read_pid(paths.pid_path()) {
        if process_alive(pid)? {
            return Err(LaunchError::AlreadyRunning { pid });
        }
        warn!(target: PROCESS_TARGET, pid, "previous daemon is gone; removing stale lock");
    }
    for path in [paths.lock_path(), paths.pid_path()] {
        remove_if_present(path).map_err(|source| LaunchError::Cleanup {
            path: path.to_path_buf(),
            source,
        })?;
    }
    acquire_lock(paths)
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path)
        .ok()?
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|pid| *pid != 0)
}

fn process_alive(pid: u32) -> Result<bool, LaunchError> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(source) => Err(LaunchError::CheckProcess { pid, source }),
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
