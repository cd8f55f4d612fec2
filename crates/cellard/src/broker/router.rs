//! Reply router thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use tracing::debug;

use super::BROKER_TARGET;
use super::bus::Reply;
use super::errors::BrokerError;
use super::peers::PeerTable;

/// Drains the reply bus into peer slots until every worker has exited.
#[derive(Debug)]
pub(crate) struct ReplyRouter {
    thread: Option<JoinHandle<u64>>,
}

impl ReplyRouter {
    pub(crate) fn spawn(replies: Receiver<Reply>, peers: Arc<PeerTable>) -> Result<Self, BrokerError> {
        let thread = thread::Builder::new()
            .name("cellard-router".to_owned())
            .spawn(move || route(&replies, &peers))
            .map_err(|source| BrokerError::Spawn {
                thread: "reply router".to_owned(),
                source,
            })?;
        Ok(Self {
            thread: Some(thread),
        })
    }

    /// Waits for the router to drain. Returns immediately when already joined.
    pub(crate) fn join(&mut self) -> Result<(), BrokerError> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map(|routed| debug!(target: BROKER_TARGET, routed, "reply router stopped"))
                .map_err(|_| BrokerError::RouterPanicked),
            None => Ok(()),
        }
    }
}

fn route(replies: &Receiver<Reply>, peers: &PeerTable) -> u64 {
    let mut routed = 0;
    for Reply { token, payload } in replies.iter() {
        if peers.deliver(token, payload) {
            routed += 1;
        }
    }
    // Every reply sender is gone, so no waiting peer can be answered.
    peers.close();
    routed
}
