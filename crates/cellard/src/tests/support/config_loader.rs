//! Configuration loaders rooted in temporary directories.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use cellar_config::{Config, LogFormat, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader whose storage and socket live under a private temporary directory.
///
/// TCP loaders bind an ephemeral loopback port; Unix loaders place the socket
/// (and therefore the runtime files) in the temporary directory.
#[derive(Clone)]
pub struct TestConfigLoader {
    dir: Arc<TempDir>,
    socket: SocketEndpoint,
    workers: usize,
}

impl TestConfigLoader {
    /// Serves on `127.0.0.1:0`.
    #[must_use]
    pub fn tcp() -> Self {
        let dir = Arc::new(TempDir::new().expect("temporary directory"));
        Self {
            dir,
            socket: SocketEndpoint::tcp("127.0.0.1", 0),
            workers: 4,
        }
    }

    /// Serves on a Unix socket inside the temporary directory.
    #[must_use]
    pub fn unix() -> Self {
        let dir = Arc::new(TempDir::new().expect("temporary directory"));
        let path = dir.path().join("run").join("cellard.sock");
        let socket = SocketEndpoint::unix(path.to_str().expect("utf-8 temp path"));
        Self {
            dir,
            socket,
            workers: 2,
        }
    }

    /// Overrides the worker pool size.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Directory holding the lock, pid and health files of Unix loaders.
    #[must_use]
    pub fn runtime_dir(&self) -> PathBuf {
        self.dir.path().join("run")
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let utf8 = |path: PathBuf| path.to_str().expect("utf-8 temp path").into();
        Ok(Config {
            daemon_socket: self.socket.clone(),
            log_format: LogFormat::Compact,
            worker_count: self.workers,
            queue_capacity: 64,
            storage_root: utf8(self.root().join("databases")),
            database_store: utf8(self.root().join("databases.json")),
            ..Config::default()
        })
    }
}

/// Loader that fails by passing an unsupported socket scheme on the command
/// line.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("cellard"),
            OsString::from("--daemon-socket"),
            OsString::from("udp://127.0.0.1:1"),
        ])
    }
}
