//! Structured health reporting for daemon and worker lifecycle events.

use std::sync::Arc;

use crate::bootstrap::BootstrapError;
use crate::broker::{TransportError, WorkerId};

use cellar_config::Config;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked by a worker thread once it is ready to receive requests.
    fn worker_started(&self, worker: WorkerId);

    /// Invoked when a worker leaves its loop after receiving a halt.
    fn worker_halted(&self, worker: WorkerId);

    /// Invoked when a worker stops because its bus endpoint failed.
    fn worker_failed(&self, worker: WorkerId, error: &TransportError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn worker_started(&self, worker: WorkerId) {
        (**self).worker_started(worker);
    }

    fn worker_halted(&self, worker: WorkerId) {
        (**self).worker_halted(worker);
    }

    fn worker_failed(&self, worker: WorkerId, error: &TransportError) {
        (**self).worker_failed(worker, error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            workers = config.worker_count(),
            storage_root = %config.storage_root(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn worker_started(&self, worker: WorkerId) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "worker_started",
            worker = %worker,
            "worker ready"
        );
    }

    fn worker_halted(&self, worker: WorkerId) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "worker_halted",
            worker = %worker,
            "worker halted"
        );
    }

    fn worker_failed(&self, worker: WorkerId, error: &TransportError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "worker_failed",
            worker = %worker,
            error = %error,
            "worker stopped on transport error"
        );
    }
}
