//! Process supervision world: runs `run_daemon_with` on a background thread
//! against test doubles for daemonisation and shutdown signalling.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use cellar_config::RuntimePaths;

use crate::health::HealthReporter;
use crate::process::{
    DaemonizeError, Daemonizer, LaunchError, LaunchMode, LaunchPlan, ProcessControl,
    ServiceDeps, ShutdownError, ShutdownSignal, run_daemon_with,
};

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::reporter::RecordingHealthReporter;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct ProcessTestWorld {
    handle: Option<thread::JoinHandle<Result<(), LaunchError>>>,
    result: Option<Result<(), LaunchError>>,
    pub reporter: Arc<RecordingHealthReporter>,
    daemonizer: TestDaemonizer,
    shutdown: TestShutdownSignal,
    loader: TestConfigLoader,
}

impl ProcessTestWorld {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handle: None,
            result: None,
            reporter: Arc::new(RecordingHealthReporter::default()),
            daemonizer: TestDaemonizer::default(),
            shutdown: TestShutdownSignal::new(),
            loader: TestConfigLoader::unix(),
        }
    }

    /// Launches the daemon on a background thread.
    pub fn start(&mut self, mode: LaunchMode) -> Result<(), String> {
        if self.handle.is_some() {
            return Err("daemon already running".to_owned());
        }
        let plan = LaunchPlan {
            process: ProcessControl {
                mode,
                daemonizer: self.daemonizer.clone(),
                shutdown: self.shutdown.clone(),
            },
            services: ServiceDeps {
                loader: self.loader.clone(),
                reporter: Arc::clone(&self.reporter) as Arc<dyn HealthReporter>,
            },
        };
        self.handle = Some(thread::spawn(move || run_daemon_with(plan)));
        Ok(())
    }

    /// Runs a launch whose configuration fails to load, on this thread.
    pub fn start_with_invalid_config(&mut self) {
        let plan = LaunchPlan {
            process: ProcessControl {
                mode: LaunchMode::Foreground,
                daemonizer: self.daemonizer.clone(),
                shutdown: self.shutdown.clone(),
            },
            services: ServiceDeps {
                loader: FailingConfigLoader,
                reporter: Arc::clone(&self.reporter) as Arc<dyn HealthReporter>,
            },
        };
        self.result = Some(run_daemon_with(plan));
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Waits for the launch thread and records its result.
    pub fn join(&mut self) -> Result<(), String> {
        let handle = self.handle.take().ok_or("daemon not running")?;
        let result = handle.join().map_err(|_| "daemon thread panicked")?;
        self.result = Some(result);
        Ok(())
    }

    #[must_use]
    pub fn result(&self) -> Option<&Result<(), LaunchError>> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn daemonizer_calls(&self) -> usize {
        self.daemonizer.calls()
    }

    #[must_use]
    pub fn paths(&self) -> RuntimePaths {
        RuntimePaths::in_directory(self.loader.runtime_dir()).expect("runtime paths")
    }

    #[must_use]
    pub fn runtime_dir(&self) -> PathBuf {
        self.loader.runtime_dir()
    }

    /// Polls the health file until it reports `expected`.
    pub fn wait_for_status(&self, expected: &str) -> Result<(), String> {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if self.health_status().as_deref() == Some(expected) {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err(format!("daemon never reported {expected}"))
    }

    #[must_use]
    pub fn health_status(&self) -> Option<String> {
        let content = fs::read_to_string(self.paths().health_path()).ok()?;
        let snapshot: Value = serde_json::from_str(&content).ok()?;
        snapshot.get("status")?.as_str().map(str::to_owned)
    }

    /// Leaves a lock and pid file behind as a crashed daemon would.
    pub fn write_stale_runtime(&self) -> Result<(), String> {
        let paths = self.paths();
        fs::write(paths.lock_path(), b"").map_err(|error| error.to_string())?;
        fs::write(paths.pid_path(), b"0\n").map_err(|error| error.to_string())
    }
}

impl Default for ProcessTestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessTestWorld {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shutdown.trigger();
            let _ = handle.join();
        }
    }
}

/// Daemoniser that only counts calls.
#[derive(Clone, Default)]
pub struct TestDaemonizer {
    calls: Arc<AtomicUsize>,
}

impl TestDaemonizer {
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Daemonizer for TestDaemonizer {
    fn daemonize(&self, _paths: &RuntimePaths) -> Result<(), DaemonizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shutdown signal released by [`TestShutdownSignal::trigger`].
#[derive(Clone)]
pub struct TestShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl TestShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn trigger(&self) {
        let (lock, condvar) = &*self.inner;
        *lock.lock().expect("shutdown mutex poisoned") = true;
        condvar.notify_all();
    }
}

impl Default for TestShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let (lock, condvar) = &*self.inner;
        let triggered = lock.lock().expect("shutdown mutex poisoned");
        let _released = condvar
            .wait_while(triggered, |triggered| !*triggered)
            .expect("shutdown mutex poisoned");
        Ok(())
    }
}
