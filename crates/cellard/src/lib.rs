//! The cellar key-value daemon.
//!
//! `cellard` serves named key-value databases to clients over a TCP or Unix
//! socket. Every request is a single JSON line holding a command descriptor
//! and its arguments; every request receives exactly one JSON line in reply.
//! See [`protocol`] for the wire format.
//!
//! Accepted connections hand their request lines to a broker, which queues
//! them on a bounded internal bus served by a fixed pool of worker threads.
//! Each worker decodes the request, resolves the target database through the
//! shared [`registry`], runs the operation and sends the reply back through a
//! router thread to the connection that asked. The registry opens databases
//! lazily, keeps one engine handle per name, and refuses to drop a database
//! while any request still holds it.
//!
//! [`run_daemon`] wraps all of this in process supervision: a singleton lock,
//! pid and health files, optional daemonisation and signal-driven shutdown.
//! Embedders and tests can instead call [`bootstrap_with`] and
//! [`Daemon::serve`] directly.

mod bootstrap;
mod broker;
mod dispatch;
mod files;
mod health;
mod process;
pub mod protocol;
pub mod registry;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, RunningDaemon, ServeError, StaticConfigLoader,
    SystemConfigLoader, bootstrap_with,
};
pub use broker::{
    Broker, BrokerError, PoolSettings, TransportError, WorkerId, WorkerPool, WorkerState,
};
pub use dispatch::{CommandError, CommandHandler, KeyValueHandler};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    DaemonizeError, Daemonizer, LaunchError, LaunchMode, ShutdownError, ShutdownSignal,
    SystemDaemonizer, SystemShutdownSignal, run_daemon,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{ListenerError, MAX_REQUEST_BYTES, Occupant};

#[cfg(test)]
mod tests;
