//! Response encoding.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{DecodeError, UnknownErrorCode};

/// Outcome reported in the response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// The operation ran; the content frame holds its result.
    Success,
    /// The operation did not run or failed; see the error code.
    Failure,
}

/// Numeric error classification carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    /// No error.
    None = 0,
    /// The database or key does not exist.
    NotFound = 1,
    /// The arguments frame does not fit the operation.
    InvalidArguments = 2,
    /// The envelope could not be decoded.
    RequestError = 3,
    /// The operation name is not recognised.
    UnknownCommand = 4,
    /// The storage engine or catalog failed.
    StorageError = 5,
    /// The database is referenced by an in-flight request.
    InUse = 6,
    /// The daemon failed internally or is shutting down.
    InternalError = 7,
}

impl ErrorCode {
    /// Wire value.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ErrorCode {
    type Error = UnknownErrorCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::None,
            1 => Self::NotFound,
            2 => Self::InvalidArguments,
            3 => Self::RequestError,
            4 => Self::UnknownCommand,
            5 => Self::StorageError,
            6 => Self::InUse,
            7 => Self::InternalError,
            other => return Err(UnknownErrorCode(other)),
        })
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Self::try_from(value).map_err(de::Error::custom)
    }
}

/// First frame of every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    /// Success or failure.
    pub status: Status,
    /// `NONE` on success.
    pub error_code: ErrorCode,
    /// Human-readable detail; empty on success.
    pub error_message: String,
}

impl ResponseHeader {
    /// Header for a successful exchange.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            error_code: ErrorCode::None,
            error_message: String::new(),
        }
    }

    /// Header for a failed exchange.
    #[must_use]
    pub fn failure(error_code: ErrorCode, error_message: impl Into<String>) -> Self {
        Self {
            status: Status::Failure,
            error_code,
            error_message: error_message.into(),
        }
    }
}

/// Named result fields of a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseContent(Map<String, Value>);

impl ResponseContent {
    /// Empty content map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing any previous value under the same name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Looks up a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns true when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A complete response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Status frame.
    pub header: ResponseHeader,
    /// Result frame; empty on failure.
    pub content: ResponseContent,
}

/// Wire bytes sent when a response cannot be serialized.
pub(crate) const FALLBACK_RESPONSE: &[u8] = b"[{\"status\":\"FAILURE\",\"error_code\":7,\"error_message\":\"response encoding failed\"},{}]\n";

impl Response {
    /// Successful response with the given content.
    #[must_use]
    pub fn success(content: ResponseContent) -> Self {
        Self {
            header: ResponseHeader::success(),
            content,
        }
    }

    /// Failed response with empty content.
    #[must_use]
    pub fn failure(error_code: ErrorCode, error_message: impl Into<String>) -> Self {
        Self {
            header: ResponseHeader::failure(error_code, error_message),
            content: ResponseContent::new(),
        }
    }

    /// Returns true for SUCCESS responses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.header.status == Status::Success
    }

    /// Serializes the response as a newline-terminated JSON line holding the
    /// header frame followed by the content frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec(&(&self.header, &self.content))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Serializes the response, substituting a generic INTERNAL_ERROR line if
    /// serialization fails so the client still receives exactly one reply.
    #[must_use]
    pub fn encode_or_fallback(&self) -> Vec<u8> {
        self.encode()
            .unwrap_or_else(|_| FALLBACK_RESPONSE.to_vec())
    }

    /// Parses a response line produced by [`Response::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a two-frame response.
    pub fn parse(line: &[u8]) -> Result<Self, serde_json::Error> {
        let (header, content): (ResponseHeader, ResponseContent) =
            serde_json::from_slice(line.trim_ascii())?;
        Ok(Self { header, content })
    }
}

impl From<&DecodeError> for Response {
    fn from(error: &DecodeError) -> Self {
        Self::failure(error.error_code(), error.to_string())
    }
}
