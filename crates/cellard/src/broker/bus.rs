//! Messages and endpoints of the internal request and reply buses.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};

use crate::protocol::RoutingToken;

/// Raw request bytes tagged with the connection they arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Envelope {
    pub token: RoutingToken,
    pub payload: Vec<u8>,
}

/// Messages carried by the request bus.
///
/// `Halt` can only be produced by the pool; no client payload decodes to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BusMessage {
    Request(Envelope),
    Halt,
}

/// Encoded response addressed to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reply {
    pub token: RoutingToken,
    pub payload: Vec<u8>,
}

/// A worker's private view of both buses.
#[derive(Debug)]
pub(crate) struct WorkerEndpoint {
    pub requests: Receiver<BusMessage>,
    pub replies: Sender<Reply>,
}

/// Raised when the request bus no longer accepts submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request bus is closed")]
pub(crate) struct BusClosed;

/// Request side of the bus handed to the frontend.
///
/// Intake is switched off when teardown begins, so connections stop queueing
/// new work before halts are sent.
#[derive(Debug, Clone)]
pub(crate) struct BusSubmitter {
    sender: Sender<BusMessage>,
    accepting: Arc<AtomicBool>,
}

impl BusSubmitter {
    pub(crate) fn new(sender: Sender<BusMessage>) -> Self {
        Self {
            sender,
            accepting: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Queues a request, blocking while the bus is full.
    pub(crate) fn submit(&self, envelope: Envelope) -> Result<(), BusClosed> {
        if !self.is_accepting() {
            return Err(BusClosed);
        }
        self.sender
            .send(BusMessage::Request(envelope))
            .map_err(|_| BusClosed)
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Stops accepting client requests. Halts can still be sent.
    pub(crate) fn close_intake(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    pub(crate) fn send_halt(&self) -> Result<(), BusClosed> {
        self.sender.send(BusMessage::Halt).map_err(|_| BusClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_intake_rejects_requests_but_not_halts() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let submitter = BusSubmitter::new(sender);
        let clone = submitter.clone();
        submitter.close_intake();

        let envelope = Envelope {
            token: RoutingToken::new(1),
            payload: b"[]".to_vec(),
        };
        assert_eq!(clone.submit(envelope), Err(BusClosed));
        submitter.send_halt().expect("halt still accepted");
        assert_eq!(receiver.try_recv(), Ok(BusMessage::Halt));
    }
}
