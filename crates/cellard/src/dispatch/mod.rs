//! Command execution for decoded requests.
//!
//! Workers hand each decoded [`Request`](crate::protocol::Request) to a
//! [`CommandHandler`]. The production handler, [`KeyValueHandler`], resolves the
//! target database through the shared registry, runs the requested primitive
//! and folds every outcome, including failures, into a
//! [`Response`](crate::protocol::Response).
//!
//! ## Operations
//!
//! | Operation | Arguments                   | Content on success           |
//! |-----------|-----------------------------|------------------------------|
//! | `PING`    | none                        | `{"message": "PONG"}`        |
//! | `GET`     | `{"key"}`                   | `{"value"}`                  |
//! | `MGET`    | `{"keys": [..]}`            | `{"values": [..]}`           |
//! | `PUT`     | `{"key", "value"}`          | `{}`                         |
//! | `DELETE`  | `{"key"}`                   | `{}`                         |
//! | `EXISTS`  | `{"key"}`                   | `{"exists"}`                 |
//! | `RANGE`   | `{"start"?, "end"?, "limit"?}` | `{"items": [[k, v], ..]}` |
//! | `SLICE`   | `{"start", "limit"}`        | `{"items": [[k, v], ..]}`    |
//! | `OPEN`    | none                        | `{"db"}`                     |
//! | `DROP`    | none                        | `{}`                         |
//! | `LIST`    | none                        | `{"databases": [..]}`        |

mod arguments;
mod errors;
mod handler;

pub use self::errors::CommandError;
pub use self::handler::{CommandHandler, KeyValueHandler};

/// Tracing target for command execution.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
