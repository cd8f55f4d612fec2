//! Client-facing side of the broker.

use std::io::{BufReader, Write};
use std::sync::Arc;

use tracing::{debug, warn};

use super::BROKER_TARGET;
use super::bus::{BusSubmitter, Envelope};
use super::peers::{Peer, PeerTable};
use crate::protocol::{ErrorCode, Response};
use crate::transport::{ConnectionHandler, ConnectionStream, LineRead, MAX_REQUEST_BYTES, read_line};

/// Forwards request lines from connections onto the request bus and writes
/// back the reply routed to each connection's token.
#[derive(Debug)]
pub(crate) struct FrontendConnectionHandler {
    peers: Arc<PeerTable>,
    bus: BusSubmitter,
    max_request_bytes: usize,
}

impl FrontendConnectionHandler {
    pub(crate) fn new(peers: Arc<PeerTable>, bus: BusSubmitter) -> Self {
        Self {
            peers,
            bus,
            max_request_bytes: MAX_REQUEST_BYTES,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_max_request_bytes(mut self, max_request_bytes: usize) -> Self {
        self.max_request_bytes = max_request_bytes;
        self
    }

    /// Registers a new client session, or `None` once the broker is stopping.
    pub(crate) fn open_session(&self) -> Option<Session> {
        if !self.bus.is_accepting() {
            return None;
        }
        self.peers.register().map(|peer| Session {
            peer,
            bus: self.bus.clone(),
        })
    }
}

impl ConnectionHandler for FrontendConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        let mut reader = BufReader::new(stream);
        let Some(session) = self.open_session() else {
            let _ = reader.get_mut().write_all(&shutting_down());
            return;
        };
        debug!(target: BROKER_TARGET, token = %session.token(), "client connected");

        loop {
            let reply = match read_line(&mut reader, self.max_request_bytes) {
                Ok(LineRead::Line(line)) => session.exchange(line),
                Ok(LineRead::TooLarge) => {
                    let response = Response::failure(
                        ErrorCode::RequestError,
                        format!("request exceeds {} bytes", self.max_request_bytes),
                    );
                    let _ = reader.get_mut().write_all(&response.encode_or_fallback());
                    break;
                }
                Ok(LineRead::Closed) => break,
                Err(error) => {
                    debug!(target: BROKER_TARGET, token = %session.token(), %error, "read failed");
                    break;
                }
            };
            if let Err(error) = reader
                .get_mut()
                .write_all(&reply)
                .and_then(|()| reader.get_mut().flush())
            {
                warn!(target: BROKER_TARGET, token = %session.token(), %error, "failed to write reply");
                break;
            }
        }
        debug!(target: BROKER_TARGET, token = %session.token(), "client disconnected");
    }
}

/// One registered client: its routing token plus access to the bus.
#[derive(Debug)]
pub(crate) struct Session {
    peer: Peer,
    bus: BusSubmitter,
}

impl Session {
    pub(crate) fn token(&self) -> crate::protocol::RoutingToken {
        self.peer.token()
    }

    /// Submits one request and waits for its reply.
    ///
    /// Always yields exactly one encoded response; if the broker stops before
    /// answering, the response says so.
    pub(crate) fn exchange(&self, payload: Vec<u8>) -> Vec<u8> {
        let envelope = Envelope {
            token: self.peer.token(),
            payload,
        };
        if self.bus.submit(envelope).is_err() {
            return shutting_down();
        }
        self.peer.await_reply().unwrap_or_else(shutting_down)
    }
}

fn shutting_down() -> Vec<u8> {
    Response::failure(ErrorCode::InternalError, "server is shutting down").encode_or_fallback()
}
