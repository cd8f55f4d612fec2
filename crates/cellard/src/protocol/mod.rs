//! Wire envelopes exchanged between clients and the daemon.
//!
//! Every exchange is one JSON line in each direction. A request line is an
//! array of exactly two frames, a command descriptor followed by an opaque
//! arguments frame:
//!
//! ```json
//! [{"command":"PUT","db":"users"},{"key":"a","value":"1"}]
//! ```
//!
//! The response is an array of two frames, a header and a content map, so a
//! client can branch on the status without looking at the content:
//!
//! ```json
//! [{"status":"SUCCESS","error_code":0,"error_message":""},{}]
//! ```
//!
//! The routing token that identifies the originating connection is owned by
//! the transport. It travels beside the payload on the internal bus and never
//! appears on the wire.

mod errors;
mod request;
mod response;

pub use self::errors::{DecodeError, UnknownErrorCode};
pub use self::request::{CommandDescriptor, Operation, Request, RoutingToken};
pub use self::response::{ErrorCode, Response, ResponseContent, ResponseHeader, Status};

/// Frames in a well-formed request envelope, excluding the routing token.
pub const REQUEST_FRAMES: usize = 2;
