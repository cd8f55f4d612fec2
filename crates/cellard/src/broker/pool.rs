//! Fixed-size worker pool and its teardown protocol.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, info, warn};

use super::BROKER_TARGET;
use super::bus::{BusSubmitter, Reply, WorkerEndpoint};
use super::errors::BrokerError;
use super::worker::{Worker, WorkerExit, WorkerId};
use crate::dispatch::CommandHandler;
use crate::health::HealthReporter;

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Number of worker threads, at least one.
    pub workers: usize,
    /// Messages the request bus holds before submitters block.
    pub queue_capacity: usize,
}

#[derive(Debug)]
struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<WorkerExit>>,
    done: Receiver<()>,
}

impl WorkerHandle {
    /// A worker is live until its completion sender is dropped.
    fn is_live(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Empty))
    }
}

/// Owns the worker threads and the request side of the bus.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    bus: Option<BusSubmitter>,
}

impl WorkerPool {
    /// Spawns `settings.workers` named worker threads.
    ///
    /// Each worker receives a clone of `replies`; the pool keeps none, so the
    /// reply bus disconnects once every worker has exited.
    pub(crate) fn spawn(
        settings: PoolSettings,
        handler: Arc<dyn CommandHandler>,
        reporter: Arc<dyn HealthReporter>,
        replies: Sender<Reply>,
    ) -> Result<Self, BrokerError> {
        let (requests, request_rx) = crossbeam_channel::bounded(settings.queue_capacity.max(1));
        let mut pool = Self {
            workers: Vec::with_capacity(settings.workers),
            bus: Some(BusSubmitter::new(requests)),
        };

        for index in 0..settings.workers.max(1) {
            let id = WorkerId::new(index);
            let (done, done_rx) = crossbeam_channel::bounded(0);
            let endpoint = WorkerEndpoint {
                requests: request_rx.clone(),
                replies: replies.clone(),
            };
            let mut worker = Worker::new(
                id,
                endpoint,
                Arc::clone(&handler),
                Arc::clone(&reporter),
                done,
            );
            let thread = thread::Builder::new()
                .name(format!("cellard-{id}"))
                .spawn(move || worker.run())
                .map_err(|source| BrokerError::Spawn {
                    thread: id.to_string(),
                    source,
                })?;
            pool.workers.push(WorkerHandle {
                id,
                thread: Some(thread),
                done: done_rx,
            });
        }

        info!(
            target: BROKER_TARGET,
            workers = pool.workers.len(),
            queue_capacity = settings.queue_capacity,
            "worker pool started"
        );
        Ok(pool)
    }

    /// Handle the frontend uses to queue requests.
    pub(crate) fn submitter(&self) -> Option<BusSubmitter> {
        self.bus.clone()
    }

    /// Number of workers that have not yet exited.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        self.workers.iter().filter(|worker| worker.is_live()).count()
    }

    /// Total workers spawned.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Whether the request bus has been closed by [`WorkerPool::shutdown`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.bus.is_none()
    }

    /// Halts every worker and closes the request bus.
    ///
    /// Intake from connections stops first. One halt is then queued per live
    /// worker; halts sit behind requests already on the bus, so those are
    /// still answered, and a busy worker sees its halt once its current
    /// request completes. Every thread is joined before the bus is closed.
    /// Calling this again after it returned is a no-op.
    ///
    /// # Errors
    ///
    /// Reports the first worker that panicked. All workers are joined
    /// regardless.
    pub fn shutdown(&mut self) -> Result<(), BrokerError> {
        let Some(bus) = self.bus.as_ref() else {
            return Ok(());
        };
        bus.close_intake();

        let live = self.live_workers();
        debug!(target: BROKER_TARGET, live, "halting workers");
        for _ in 0..live {
            if bus.send_halt().is_err() {
                // Every worker already dropped its receiver.
                break;
            }
        }

        let mut result = Ok(());
        for worker in &mut self.workers {
            let Some(thread) = worker.thread.take() else {
                continue;
            };
            match thread.join() {
                Ok(exit) => debug!(target: BROKER_TARGET, worker = %worker.id, ?exit, "worker joined"),
                Err(_) => {
                    warn!(target: BROKER_TARGET, worker = %worker.id, "worker panicked");
                    if result.is_ok() {
                        result = Err(BrokerError::WorkerPanicked { worker: worker.id });
                    }
                }
            }
        }

        self.bus = None;
        info!(target: BROKER_TARGET, "worker pool stopped");
        result
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            warn!(target: BROKER_TARGET, %error, "worker pool teardown failed");
        }
    }
}
