//! Request broker: frontend, internal buses, worker pool and reply router.
//!
//! ```text
//! connection ──► frontend ──► request bus ──► worker ──► reply bus ──► router ──► connection
//!                (token)       (MPMC, bounded)  (decode, handle)          (token → slot)
//! ```
//!
//! Each accepted connection registers a routing token with the peer table and
//! forwards its request lines, tagged with that token, onto the request bus.
//! Every idle worker blocks on the same bus, so the next idle worker takes the
//! next message without any dispatch queue in the broker. Workers send the
//! encoded response back tagged with the same token, and the reply router
//! hands it to the connection that owns the token.
//!
//! Teardown runs in a fixed order: the pool stops intake and halts its
//! workers, then the router drains the replies that are left and exits once
//! the last worker has dropped its reply sender.

mod bus;
mod errors;
mod frontend;
mod peers;
mod pool;
mod router;
mod worker;

use std::sync::Arc;

use tracing::info;

pub use self::errors::{BrokerError, TransportError};
pub use self::pool::{PoolSettings, WorkerPool};
pub use self::worker::{WorkerId, WorkerState};

use self::frontend::FrontendConnectionHandler;
use self::peers::PeerTable;
use self::router::ReplyRouter;
use crate::dispatch::CommandHandler;
use crate::health::HealthReporter;
use crate::transport::ConnectionHandler;

const BROKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::broker");

/// Running broker.
#[derive(Debug)]
pub struct Broker {
    pool: WorkerPool,
    router: ReplyRouter,
    frontend: Arc<FrontendConnectionHandler>,
}

impl Broker {
    /// Spawns the worker pool and the reply router.
    ///
    /// # Errors
    ///
    /// Fails when a thread cannot be spawned. Workers already started are
    /// halted before the error is returned.
    pub fn start(
        settings: PoolSettings,
        handler: Arc<dyn CommandHandler>,
        reporter: Arc<dyn HealthReporter>,
    ) -> Result<Self, BrokerError> {
        let (replies, reply_rx) = crossbeam_channel::unbounded();
        let peers = PeerTable::new();
        let router = ReplyRouter::spawn(reply_rx, Arc::clone(&peers))?;
        // If spawning fails, the replies sender is dropped here and the router
        // exits on its own.
        let pool = WorkerPool::spawn(settings, handler, reporter, replies)?;
        let bus = pool.submitter().ok_or_else(|| BrokerError::Spawn {
            thread: "request bus".to_owned(),
            source: std::io::Error::other("worker pool closed during start"),
        })?;
        let frontend = Arc::new(FrontendConnectionHandler::new(peers, bus));
        Ok(Self {
            pool,
            router,
            frontend,
        })
    }

    /// Connection handler to install on the listener.
    pub(crate) fn connection_handler(&self) -> Arc<dyn ConnectionHandler> {
        Arc::clone(&self.frontend) as Arc<dyn ConnectionHandler>
    }

    #[cfg(test)]
    pub(crate) fn frontend(&self) -> &FrontendConnectionHandler {
        &self.frontend
    }

    /// The worker pool.
    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Stops the worker pool, then the reply router.
    ///
    /// # Errors
    ///
    /// Reports a worker or router panic after every thread has been joined.
    pub fn shutdown(&mut self) -> Result<(), BrokerError> {
        let pool = self.pool.shutdown();
        let router = self.router.join();
        info!(target: BROKER_TARGET, "broker stopped");
        pool.and(router)
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        if !self.pool.is_closed() {
            let _ = self.shutdown();
        }
    }
}
