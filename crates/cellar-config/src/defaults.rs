use std::env;

use camino::Utf8PathBuf;

use crate::socket::SocketEndpoint;

/// Default TCP host the daemon listens on.
pub const DEFAULT_TCP_HOST: &str = "127.0.0.1";

/// Default TCP port the daemon listens on.
pub const DEFAULT_TCP_PORT: u16 = 4141;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default number of worker threads.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default capacity of the internal request bus.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Name of the database created on first start.
pub const DEFAULT_DATABASE: &str = "default";

/// Default log filter expression used by the daemon.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required.
pub(crate) fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Owned default database name.
pub(crate) fn default_database_string() -> String {
    DEFAULT_DATABASE.to_owned()
}

/// Default logging format for the daemon.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Computes the default client endpoint.
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp(DEFAULT_TCP_HOST, DEFAULT_TCP_PORT)
}

/// Directory under which databases are stored unless configured otherwise.
pub fn default_storage_root() -> Utf8PathBuf {
    data_directory().join("databases")
}

/// Catalog file listing known databases unless configured otherwise.
pub fn default_database_store() -> Utf8PathBuf {
    data_directory().join("databases.json")
}

fn data_directory() -> Utf8PathBuf {
    let base = dirs::data_local_dir()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(fallback_base_directory);
    base.join("cellar")
}

fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
