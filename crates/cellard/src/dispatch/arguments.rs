//! Typed views over the opaque arguments frame.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::CommandError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct KeyArgs {
    pub key: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct KeysArgs {
    pub keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct PutArgs {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RangeArgs {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct SliceArgs {
    pub start: String,
    pub limit: usize,
}

/// Decodes a required arguments object.
pub(super) fn parse<T: DeserializeOwned>(arguments: &Value) -> Result<T, CommandError> {
    T::deserialize(arguments).map_err(|error| CommandError::invalid_arguments(error.to_string()))
}

/// Decodes an arguments object where `null` stands for "no arguments".
pub(super) fn parse_optional<T: DeserializeOwned + Default>(
    arguments: &Value,
) -> Result<T, CommandError> {
    if arguments.is_null() {
        return Ok(T::default());
    }
    parse(arguments)
}
