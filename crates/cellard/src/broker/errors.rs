//! Error types for the broker and worker pool.

use std::io;

use thiserror::Error;

use super::worker::WorkerId;
use crate::protocol::RoutingToken;

/// Failures that stop a worker loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Every sender on the request bus is gone.
    #[error("request bus disconnected")]
    ReceiveDisconnected,

    /// The reply router is gone, so the reply for `token` was lost.
    #[error("reply bus disconnected while answering {token}")]
    ReplyDisconnected {
        /// Request whose reply was lost.
        token: RoutingToken,
    },
}

/// Failures raised while starting or stopping the broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// An OS thread could not be spawned.
    #[error("failed to spawn {thread}: {source}")]
    Spawn {
        /// Role of the thread.
        thread: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A worker thread panicked instead of halting.
    #[error("{worker} panicked")]
    WorkerPanicked {
        /// Worker whose thread panicked.
        worker: WorkerId,
    },

    /// The reply router thread panicked.
    #[error("reply router panicked")]
    RouterPanicked,
}
