//! BDD world for bootstrap and request scenarios: loader, reporter, the
//! serving daemon and one connected client.

use std::cell::RefCell;
use std::sync::Arc;

use serde_json::Value;

use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, RunningDaemon, bootstrap_with};
use crate::protocol::Response;

use super::client::Client;
use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::reporter::RecordingHealthReporter;

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    // Fields drop in order: the client disconnects, the daemon stops, and
    // only then does the loader remove its temporary directory.
    client: Option<Client>,
    running: Option<RunningDaemon>,
    daemon: Option<Daemon>,
    pub reporter: Arc<RecordingHealthReporter>,
    bootstrap_error: Option<BootstrapError>,
    last_response: Option<Response>,
    workers: usize,
    loader: Box<dyn ConfigLoader>,
}

impl TestWorld {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: None,
            running: None,
            daemon: None,
            reporter: Arc::new(RecordingHealthReporter::default()),
            bootstrap_error: None,
            last_response: None,
            workers: 4,
            loader: Box::new(TestConfigLoader::tcp()),
        }
    }

    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
    }

    pub fn use_workers(&mut self, workers: usize) {
        self.workers = workers;
        self.loader = Box::new(TestConfigLoader::tcp().with_workers(workers));
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.daemon.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        let reporter = Arc::clone(&self.reporter) as Arc<dyn crate::health::HealthReporter>;
        match bootstrap_with(&*self.loader, reporter) {
            Ok(daemon) => self.daemon = Some(daemon),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    #[must_use]
    pub fn daemon(&self) -> Option<&Daemon> {
        self.daemon.as_ref()
    }

    /// Starts serving the bootstrapped daemon.
    pub fn serve(&mut self) -> Result<(), String> {
        let daemon = self.daemon.take().ok_or("daemon was not bootstrapped")?;
        let running = daemon.serve().map_err(|error| error.to_string())?;
        self.running = Some(running);
        Ok(())
    }

    /// Bootstraps, serves and connects a client.
    pub fn start_serving(&mut self) -> Result<(), String> {
        self.bootstrap();
        if let Some(error) = &self.bootstrap_error {
            return Err(error.to_string());
        }
        self.serve()?;
        self.connect()
    }

    pub fn connect(&mut self) -> Result<(), String> {
        let addr = self
            .running
            .as_ref()
            .and_then(RunningDaemon::local_addr)
            .ok_or("daemon is not serving on TCP")?;
        self.client = Some(Client::connect(addr));
        Ok(())
    }

    pub fn request(&mut self, command: &str, database: Option<&str>, arguments: Value) {
        let client = self.client.as_mut().expect("client connected");
        self.last_response = Some(client.request(command, database, arguments));
    }

    pub fn send_raw(&mut self, line: &str) {
        let client = self.client.as_mut().expect("client connected");
        self.last_response = client.send_raw(line);
    }

    #[must_use]
    pub fn last_response(&self) -> &Response {
        self.last_response.as_ref().expect("a response was received")
    }

    /// Closes the client and tears the daemon down.
    pub fn shutdown(&mut self) -> Result<(), String> {
        self.client = None;
        let running = self.running.take().ok_or("daemon is not serving")?;
        running.shutdown().map_err(|error| error.to_string())
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
