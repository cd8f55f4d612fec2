//! Routing-token table for connected clients.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use super::BROKER_TARGET;
use crate::protocol::RoutingToken;

#[derive(Debug, Default)]
struct PeerState {
    next: u64,
    slots: HashMap<RoutingToken, Sender<Vec<u8>>>,
    closed: bool,
}

/// Maps routing tokens to the reply slot of the owning connection.
#[derive(Debug, Default)]
pub(crate) struct PeerTable {
    state: Mutex<PeerState>,
}

impl PeerTable {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a connection under a fresh token.
    ///
    /// Returns `None` once the table has been closed.
    pub(crate) fn register(self: &Arc<Self>) -> Option<Peer> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        state.next += 1;
        let token = RoutingToken::new(state.next);
        let (slot, replies) = crossbeam_channel::bounded(1);
        state.slots.insert(token, slot);
        Some(Peer {
            token,
            replies,
            table: Arc::clone(self),
        })
    }

    /// Hands a reply to the connection owning `token`.
    ///
    /// Returns false when the connection has already gone.
    pub(crate) fn deliver(&self, token: RoutingToken, payload: Vec<u8>) -> bool {
        let state = self.lock();
        let Some(slot) = state.slots.get(&token) else {
            debug!(target: BROKER_TARGET, token = %token, "discarding reply for departed peer");
            return false;
        };
        match slot.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(target: BROKER_TARGET, token = %token, "peer already has a pending reply");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Drops every reply slot and refuses further registrations.
    ///
    /// Connections waiting for a reply observe a disconnected slot.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.slots.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().slots.len()
    }

    fn remove(&self, token: RoutingToken) {
        self.lock().slots.remove(&token);
    }

    fn lock(&self) -> MutexGuard<'_, PeerState> {
        // The state stays consistent across a panic: every mutation is a
        // single map operation or flag store.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A registered connection. Deregisters on drop.
#[derive(Debug)]
pub(crate) struct Peer {
    token: RoutingToken,
    replies: Receiver<Vec<u8>>,
    table: Arc<PeerTable>,
}

impl Peer {
    pub(crate) fn token(&self) -> RoutingToken {
        self.token
    }

    /// Waits for the next reply. `None` means the broker is gone.
    pub(crate) fn await_reply(&self) -> Option<Vec<u8>> {
        self.replies.recv().ok()
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        self.table.remove(self.token);
    }
}
