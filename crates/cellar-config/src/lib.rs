//! Shared configuration for the cellar key-value daemon.
//!
//! Configuration is layered by [`ortho_config`]: compiled defaults are
//! overridden by a configuration file (`--config-path` or
//! `CELLAR_CONFIG_PATH`), then by `CELLAR_*` environment variables, and finally
//! by command-line flags such as `--daemon-socket tcp://127.0.0.1:5000`.

mod defaults;
mod logging;
mod runtime;
mod socket;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_DATABASE, DEFAULT_LOG_FILTER, DEFAULT_QUEUE_CAPACITY, DEFAULT_TCP_HOST,
    DEFAULT_TCP_PORT, DEFAULT_WORKER_COUNT, default_database_store, default_log_filter,
    default_log_format, default_socket_endpoint, default_storage_root,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "CELLAR")]
pub struct Config {
    /// External endpoint clients connect to.
    #[ortho_config(default = default_socket_endpoint())]
    pub daemon_socket: SocketEndpoint,
    /// `tracing` filter expression, for example `info` or `cellard=debug`.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for structured logs.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Number of worker threads serving requests.
    #[ortho_config(default = DEFAULT_WORKER_COUNT)]
    pub worker_count: usize,
    /// Capacity of the internal request bus before clients are held back.
    #[ortho_config(default = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    /// Directory under which every database gets its own subdirectory.
    #[ortho_config(default = default_storage_root())]
    pub storage_root: Utf8PathBuf,
    /// JSON file recording the names of known databases.
    #[ortho_config(default = default_database_store())]
    pub database_store: Utf8PathBuf,
    /// Database used when a request does not name one.
    #[ortho_config(default = defaults::default_database_string())]
    pub default_database: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            log_filter: defaults::default_log_filter_string(),
            log_format: default_log_format(),
            worker_count: DEFAULT_WORKER_COUNT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            storage_root: default_storage_root(),
            database_store: default_database_store(),
            default_database: defaults::default_database_string(),
        }
    }
}

impl Config {
    /// Socket endpoint the daemon binds for clients.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Log filter expression passed to the subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Worker pool size, never less than one.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count.max(1)
    }

    /// Request bus capacity, never less than one.
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Root directory for database storage.
    #[must_use]
    pub fn storage_root(&self) -> &Utf8Path {
        self.storage_root.as_path()
    }

    /// Path of the database catalog file.
    #[must_use]
    pub fn database_store(&self) -> &Utf8Path {
        self.database_store.as_path()
    }

    /// Name of the database targeted by requests that omit one.
    #[must_use]
    pub fn default_database(&self) -> &str {
        self.default_database.as_str()
    }
}
