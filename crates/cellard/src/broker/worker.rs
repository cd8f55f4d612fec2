//! Worker loop.
//!
//! A worker owns a private endpoint on both buses and serves one request at a
//! time. It blocks on the request bus; whichever idle worker receives a message
//! first handles it. The loop ends on [`BusMessage::Halt`] or when an endpoint
//! disconnects. [`WorkerState::Stopped`] is terminal.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, error, trace};

use super::BROKER_TARGET;
use super::bus::{BusMessage, Envelope, Reply, WorkerEndpoint};
use super::errors::TransportError;
use crate::dispatch::CommandHandler;
use crate::health::HealthReporter;
use crate::protocol::{ErrorCode, Request, Response};

/// Index of a worker within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(usize);

impl WorkerId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "worker-{}", self.0)
    }
}

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed but not yet receiving.
    Idle,
    /// Receiving and serving requests.
    Running,
    /// Left its loop. Never changes again.
    Stopped,
}

/// Why a worker left its loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WorkerExit {
    Halted,
    Failed(TransportError),
}

pub(crate) struct Worker {
    id: WorkerId,
    state: WorkerState,
    processing: bool,
    endpoint: WorkerEndpoint,
    handler: Arc<dyn CommandHandler>,
    reporter: Arc<dyn HealthReporter>,
    // Dropped when the worker is, which the pool observes as completion.
    _done: Sender<()>,
}

impl Worker {
    pub(crate) fn new(
        id: WorkerId,
        endpoint: WorkerEndpoint,
        handler: Arc<dyn CommandHandler>,
        reporter: Arc<dyn HealthReporter>,
        done: Sender<()>,
    ) -> Self {
        Self {
            id,
            state: WorkerState::Idle,
            processing: false,
            endpoint,
            handler,
            reporter,
            _done: done,
        }
    }

    /// Serves requests until halted or disconnected.
    pub(crate) fn run(&mut self) -> WorkerExit {
        if self.state == WorkerState::Stopped {
            return WorkerExit::Halted;
        }
        self.state = WorkerState::Running;
        self.reporter.worker_started(self.id);

        let exit = loop {
            let message = match self.endpoint.requests.recv() {
                Ok(message) => message,
                Err(_) => break WorkerExit::Failed(TransportError::ReceiveDisconnected),
            };
            match message {
                BusMessage::Halt => break WorkerExit::Halted,
                BusMessage::Request(envelope) => {
                    if let Err(error) = self.serve(envelope) {
                        break WorkerExit::Failed(error);
                    }
                }
            }
        };

        self.state = WorkerState::Stopped;
        match &exit {
            WorkerExit::Halted => self.reporter.worker_halted(self.id),
            WorkerExit::Failed(error) => self.reporter.worker_failed(self.id, error),
        }
        exit
    }

    fn serve(&mut self, envelope: Envelope) -> Result<(), TransportError> {
        let Envelope { token, payload } = envelope;
        let response = match Request::decode(token, &payload) {
            Ok(request) => {
                self.processing = true;
                self.execute(&request)
            }
            Err(error) => {
                debug!(
                    target: BROKER_TARGET,
                    worker = %self.id,
                    token = %token,
                    error = %error,
                    "rejecting undecodable request"
                );
                Response::from(&error)
            }
        };

        let reply = Reply {
            token,
            payload: response.encode_or_fallback(),
        };
        trace!(target: BROKER_TARGET, worker = %self.id, token = %token, "sending reply");
        let sent = self
            .endpoint
            .replies
            .send(reply)
            .map_err(|_| TransportError::ReplyDisconnected { token });
        self.processing = false;
        sent
    }

    fn execute(&self, request: &Request) -> Response {
        panic::catch_unwind(AssertUnwindSafe(|| self.handler.handle(request))).unwrap_or_else(|_| {
            error!(
                target: BROKER_TARGET,
                worker = %self.id,
                operation = request.operation().as_str(),
                "command handler panicked"
            );
            Response::failure(ErrorCode::InternalError, "command handler panicked")
        })
    }
}

#[cfg(test)]
impl Worker {
    pub(crate) fn id(&self) -> WorkerId {
        self.id
    }

    pub(crate) fn state(&self) -> WorkerState {
        self.state
    }

    /// Whether a request is between decode and reply.
    pub(crate) fn is_processing(&self) -> bool {
        self.processing
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Worker")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("processing", &self.processing)
            .finish_non_exhaustive()
    }
}
