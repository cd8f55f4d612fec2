//! Recording [`HealthReporter`] split into bootstrap and worker timelines.

use std::sync::{Mutex, MutexGuard};

use cellar_config::Config;

use crate::bootstrap::BootstrapError;
use crate::broker::{TransportError, WorkerId};
use crate::health::HealthReporter;

/// Bootstrap progress in the order it was reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapPhase {
    Starting,
    Succeeded,
    Failed(String),
}

/// A lifecycle change reported by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerChange {
    Started,
    Halted,
    Failed(TransportError),
}

#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    bootstrap: Mutex<Vec<BootstrapPhase>>,
    workers: Mutex<Vec<(WorkerId, WorkerChange)>>,
}

impl RecordingHealthReporter {
    #[must_use]
    pub fn bootstrap_phases(&self) -> Vec<BootstrapPhase> {
        lock(&self.bootstrap).clone()
    }

    #[must_use]
    pub fn saw_bootstrap_failure(&self) -> bool {
        lock(&self.bootstrap)
            .iter()
            .any(|phase| matches!(phase, BootstrapPhase::Failed(_)))
    }

    /// Every worker change, in arrival order across all workers.
    #[must_use]
    pub fn worker_changes(&self) -> Vec<(WorkerId, WorkerChange)> {
        lock(&self.workers).clone()
    }

    /// How many worker changes satisfy `predicate`.
    pub fn workers_where(&self, predicate: impl Fn(&WorkerChange) -> bool) -> usize {
        lock(&self.workers)
            .iter()
            .filter(|(_, change)| predicate(change))
            .count()
    }

    fn worker(&self, worker: WorkerId, change: WorkerChange) {
        lock(&self.workers).push((worker, change));
    }
}

fn lock<T>(events: &Mutex<T>) -> MutexGuard<'_, T> {
    events.lock().expect("recorder mutex poisoned")
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        lock(&self.bootstrap).push(BootstrapPhase::Starting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        lock(&self.bootstrap).push(BootstrapPhase::Succeeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        lock(&self.bootstrap).push(BootstrapPhase::Failed(error.to_string()));
    }

    fn worker_started(&self, worker: WorkerId) {
        self.worker(worker, WorkerChange::Started);
    }

    fn worker_halted(&self, worker: WorkerId) {
        self.worker(worker, WorkerChange::Halted);
    }

    fn worker_failed(&self, worker: WorkerId, error: &TransportError) {
        self.worker(worker, WorkerChange::Failed(error.clone()));
    }
}
