//! Request decoding.
//!
//! A raw request line is parsed into a [`Request`] carrying the routing token
//! assigned by the frontend, the decoded command descriptor and the arguments
//! frame, which stays an opaque JSON value until the command handler reads it.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use super::REQUEST_FRAMES;
use super::errors::DecodeError;

/// Identifies the connection a request arrived on.
///
/// Workers never interpret the token; they copy it onto the reply so the
/// router can find the originating connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutingToken(u64);

impl RoutingToken {
    /// Wraps a raw token value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw token value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RoutingToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:016x}", self.0)
    }
}

/// Operations understood by the command handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `PING`: liveness check.
    Ping,
    /// `GET`: one value by key.
    Get,
    /// `MGET`: several values by key.
    MultiGet,
    /// `PUT`: store a value.
    Put,
    /// `DELETE`: remove a key.
    Delete,
    /// `EXISTS`: key presence.
    Exists,
    /// `RANGE`: entries between inclusive bounds.
    Range,
    /// `SLICE`: a bounded number of entries from a start key.
    Slice,
    /// `OPEN`: create or open a database.
    Open,
    /// `DROP`: destroy a database.
    Drop,
    /// `LIST`: known database names.
    List,
}

impl Operation {
    const ALL: [Self; 11] = [
        Self::Ping,
        Self::Get,
        Self::MultiGet,
        Self::Put,
        Self::Delete,
        Self::Exists,
        Self::Range,
        Self::Slice,
        Self::Open,
        Self::Drop,
        Self::List,
    ];

    /// Parses a wire command name, ignoring ASCII case and surrounding
    /// whitespace.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|operation| operation.as_str().eq_ignore_ascii_case(name))
    }

    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "PING",
            Self::Get => "GET",
            Self::MultiGet => "MGET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Exists => "EXISTS",
            Self::Range => "RANGE",
            Self::Slice => "SLICE",
            Self::Open => "OPEN",
            Self::Drop => "DROP",
            Self::List => "LIST",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Decoded first frame of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Requested operation.
    pub operation: Operation,
    /// Target database. `None` selects the configured default.
    pub database: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDescriptor {
    command: String,
    #[serde(default)]
    db: Option<String>,
}

/// A decoded request travelling from a worker to the command handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    routing_token: RoutingToken,
    command: CommandDescriptor,
    arguments: Value,
}

impl Request {
    /// Builds a request from already decoded parts.
    #[must_use]
    pub fn new(routing_token: RoutingToken, command: CommandDescriptor, arguments: Value) -> Self {
        Self {
            routing_token,
            command,
            arguments,
        }
    }

    /// Decodes a raw request line.
    ///
    /// Trailing whitespace, including the newline delimiter, is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Protocol`] when the line is not a JSON array of
    /// exactly two frames or the descriptor is malformed, and
    /// [`DecodeError::UnknownCommand`] when the descriptor names an operation
    /// that does not exist.
    pub fn decode(routing_token: RoutingToken, raw: &[u8]) -> Result<Self, DecodeError> {
        let trimmed = raw.trim_ascii();
        if trimmed.is_empty() {
            return Err(DecodeError::protocol("empty request line"));
        }

        let envelope: Value = serde_json::from_slice(trimmed)
            .map_err(|error| DecodeError::from_json_error("invalid JSON", error))?;
        let Value::Array(frames) = envelope else {
            return Err(DecodeError::protocol("request must be an array of frames"));
        };
        let frame_count = frames.len();
        let [descriptor, arguments]: [Value; REQUEST_FRAMES] =
            frames.try_into().map_err(|_| {
                DecodeError::protocol(format!(
                    "expected {REQUEST_FRAMES} frames, received {frame_count}"
                ))
            })?;

        let command = decode_descriptor(descriptor)?;
        Ok(Self::new(routing_token, command, arguments))
    }

    /// Token of the originating connection.
    #[must_use]
    pub fn routing_token(&self) -> RoutingToken {
        self.routing_token
    }

    /// Requested operation.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.command.operation
    }

    /// Database named by the request, if any.
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.command.database.as_deref()
    }

    /// Command descriptor.
    #[must_use]
    pub fn command(&self) -> &CommandDescriptor {
        &self.command
    }

    /// Opaque arguments frame.
    #[must_use]
    pub fn arguments(&self) -> &Value {
        &self.arguments
    }
}

fn decode_descriptor(frame: Value) -> Result<CommandDescriptor, DecodeError> {
    let raw: RawDescriptor = serde_json::from_value(frame)
        .map_err(|error| DecodeError::from_json_error("invalid command descriptor", error))?;

    let database = match raw.db {
        Some(name) if name.trim().is_empty() => {
            return Err(DecodeError::protocol("db field is empty"));
        }
        other => other,
    };

    let command = raw.command.trim();
    if command.is_empty() {
        return Err(DecodeError::protocol("command field is empty"));
    }
    let operation = Operation::parse(command).ok_or_else(|| DecodeError::unknown_command(command))?;

    Ok(CommandDescriptor {
        operation,
        database,
    })
}
