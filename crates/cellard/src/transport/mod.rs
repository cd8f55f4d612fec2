//! Client-facing socket listener.
//!
//! The listener binds the configured TCP or Unix endpoint, accepts
//! connections on a background thread and hands each one to a
//! [`ConnectionHandler`] on its own thread.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod listener_tests;

pub use self::errors::{ListenerError, Occupant};
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream, LineRead, read_line};
pub(crate) use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Largest request line accepted from a client, newline included.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;
