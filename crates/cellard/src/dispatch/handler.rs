//! Key-value command handler.

use std::ops::Bound;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::DISPATCH_TARGET;
use super::arguments::{self, KeyArgs, KeysArgs, PutArgs, RangeArgs, SliceArgs};
use super::errors::CommandError;
use crate::protocol::{Operation, Request, Response, ResponseContent};
use crate::registry::{Database, Entry, Registry};

/// Key-level operation run against one open database.
type DataCommand = fn(&Database, &Value) -> Result<ResponseContent, CommandError>;

/// Executes decoded requests.
///
/// Implementations are shared by every worker thread and must answer every
/// request; failures are reported through the response header.
pub trait CommandHandler: Send + Sync + 'static {
    /// Executes the request and builds its response.
    fn handle(&self, request: &Request) -> Response;
}

/// Serves key-value operations against the database registry.
#[derive(Debug, Clone)]
pub struct KeyValueHandler {
    registry: Arc<Registry>,
}

impl KeyValueHandler {
    /// Creates a handler over the shared registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    fn execute(&self, request: &Request) -> Result<ResponseContent, CommandError> {
        let database = request
            .database()
            .unwrap_or_else(|| self.registry.default_database());
        let arguments = request.arguments();

        let with_database = |command: DataCommand| -> Result<ResponseContent, CommandError> {
            let handle = self.registry.resolve_or_open(database)?;
            command(&handle, arguments)
        };

        match request.operation() {
            Operation::Ping => Ok(ResponseContent::new().with("message", "PONG")),
            Operation::List => {
                let names: Vec<String> = self.registry.list()?.collect();
                Ok(ResponseContent::new().with("databases", names))
            }
            Operation::Open => {
                self.registry.create(database)?;
                Ok(ResponseContent::new().with("db", database))
            }
            Operation::Drop => {
                self.registry.drop_database(database)?;
                Ok(ResponseContent::new())
            }
            Operation::Get => with_database(get),
            Operation::MultiGet => with_database(multi_get),
            Operation::Put => with_database(put),
            Operation::Delete => with_database(delete),
            Operation::Exists => with_database(exists),
            Operation::Range => with_database(range),
            Operation::Slice => with_database(slice),
        }
    }
}

impl CommandHandler for KeyValueHandler {
    fn handle(&self, request: &Request) -> Response {
        debug!(
            target: DISPATCH_TARGET,
            operation = request.operation().as_str(),
            database = request.database(),
            token = %request.routing_token(),
            "executing command"
        );
        match self.execute(request) {
            Ok(content) => Response::success(content),
            Err(error) => {
                debug!(
                    target: DISPATCH_TARGET,
                    operation = request.operation().as_str(),
                    code = error.error_code().code(),
                    %error,
                    "command failed"
                );
                Response::from(&error)
            }
        }
    }
}

fn get(database: &Database, arguments: &Value) -> Result<ResponseContent, CommandError> {
    let KeyArgs { key } = arguments::parse(arguments)?;
    let value = database
        .get(&key)?
        .ok_or(CommandError::KeyNotFound { key })?;
    Ok(ResponseContent::new().with("value", value))
}

fn multi_get(database: &Database, arguments: &Value) -> Result<ResponseContent, CommandError> {
    let KeysArgs { keys } = arguments::parse(arguments)?;
    let values = keys
        .iter()
        .map(|key| database.get(key).map(Value::from))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ResponseContent::new().with("values", values))
}

fn put(database: &Database, arguments: &Value) -> Result<ResponseContent, CommandError> {
    let PutArgs { key, value } = arguments::parse(arguments)?;
    database.put(&key, &value)?;
    Ok(ResponseContent::new())
}

fn delete(database: &Database, arguments: &Value) -> Result<ResponseContent, CommandError> {
    let KeyArgs { key } = arguments::parse(arguments)?;
    database.delete(&key)?;
    Ok(ResponseContent::new())
}

fn exists(database: &Database, arguments: &Value) -> Result<ResponseContent, CommandError> {
    let KeyArgs { key } = arguments::parse(arguments)?;
    let exists = database.contains(&key)?;
    Ok(ResponseContent::new().with("exists", exists))
}

fn range(database: &Database, arguments: &Value) -> Result<ResponseContent, CommandError> {
    let RangeArgs { start, end, limit } = arguments::parse_optional(arguments)?;
    if let (Some(start), Some(end)) = (&start, &end)
        && start > end
    {
        return Err(CommandError::invalid_arguments(format!(
            "range start {start:?} is after end {end:?}"
        )));
    }
    let bounds = (bound(start.as_deref()), bound(end.as_deref()));
    Ok(items(database.range(bounds, limit)?))
}

/// `limit` entries starting at `start`, inclusive.
fn slice(database: &Database, arguments: &Value) -> Result<ResponseContent, CommandError> {
    let SliceArgs { start, limit } = arguments::parse(arguments)?;
    let bounds = (Bound::Included(start.as_str()), Bound::Unbounded);
    Ok(items(database.range(bounds, Some(limit))?))
}

fn bound(key: Option<&str>) -> Bound<&str> {
    key.map_or(Bound::Unbounded, Bound::Included)
}

fn items(entries: Vec<Entry>) -> ResponseContent {
    let items: Vec<Value> = entries
        .into_iter()
        .map(|(key, value)| Value::Array(vec![key.into(), value.into()]))
        .collect();
    ResponseContent::new().with("items", items)
}
