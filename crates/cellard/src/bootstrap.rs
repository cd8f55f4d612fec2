//! Daemon bootstrap orchestration.

use std::net::SocketAddr;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::info;

use cellar_config::{Config, SocketPreparationError};

use crate::broker::{Broker, BrokerError, PoolSettings};
use crate::dispatch::{CommandHandler, KeyValueHandler};
use crate::health::HealthReporter;
use crate::registry::{Registry, RegistryError};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration resolved earlier.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare daemon socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
    /// The database registry could not be opened.
    #[error("failed to open database registry: {source}")]
    Registry {
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },
}

/// Errors surfaced while starting or stopping the request path.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Binding or running the client listener failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// The broker could not start or did not stop cleanly.
    #[error(transparent)]
    Broker(#[from] BrokerError),
    /// Closing the databases failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    registry: Arc<Registry>,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Database registry shared by every worker.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Binds the configured endpoint and starts serving requests.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint cannot be bound or a thread cannot be spawned.
    pub fn serve(self) -> Result<RunningDaemon, ServeError> {
        let listener = SocketListener::bind(self.config.daemon_socket())?;
        self.start(listener)
    }

    /// Starts the broker and attaches it to an already bound listener.
    pub(crate) fn start(self, listener: SocketListener) -> Result<RunningDaemon, ServeError> {
        let settings = PoolSettings {
            workers: self.config.worker_count(),
            queue_capacity: self.config.queue_capacity(),
        };
        let handler: Arc<dyn CommandHandler> =
            Arc::new(KeyValueHandler::new(Arc::clone(&self.registry)));
        let mut broker = Broker::start(settings, handler, self.reporter)?;

        let local_addr = listener.local_addr();
        let endpoint = listener.endpoint().clone();
        let listener = match listener.start(broker.connection_handler()) {
            Ok(handle) => handle,
            Err(error) => {
                let _ = broker.shutdown();
                return Err(error.into());
            }
        };
        info!(
            target: BOOTSTRAP_TARGET,
            endpoint = %endpoint,
            workers = settings.workers,
            "serving requests"
        );
        Ok(RunningDaemon {
            listener: Some(listener),
            broker,
            registry: self.registry,
            local_addr,
        })
    }
}

/// A daemon accepting connections.
///
/// Dropping it without calling [`RunningDaemon::shutdown`] stops the listener
/// and the broker but skips the final flush.
pub struct RunningDaemon {
    listener: Option<ListenerHandle>,
    broker: Broker,
    registry: Arc<Registry>,
    local_addr: Option<SocketAddr>,
}

impl RunningDaemon {
    /// Bound TCP address; `None` for Unix sockets.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Database registry shared by every worker.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The running broker.
    #[must_use]
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Stops accepting, halts the workers, stops the reply router and closes
    /// every database, in that order.
    ///
    /// # Errors
    ///
    /// Reports the first failing stage. Later stages still run.
    pub fn shutdown(mut self) -> Result<(), ServeError> {
        let listener = match self.listener.take() {
            Some(handle) => {
                handle.shutdown();
                handle.join().map_err(ServeError::from)
            }
            None => Ok(()),
        };
        let broker = self.broker.shutdown().map_err(ServeError::from);
        let registry = self.registry.close_all().map_err(ServeError::from);
        info!(target: BOOTSTRAP_TARGET, "daemon stopped");
        listener.and(broker).and(registry)
    }
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// # Errors
///
/// Fails when configuration, telemetry, the socket directory or the registry
/// cannot be prepared. The reporter sees the failure before it is returned.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    if let Err(source) = config.daemon_socket().prepare_filesystem() {
        let error = BootstrapError::Socket { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    let registry = match Registry::open(
        config.storage_root().as_std_path(),
        config.database_store().as_std_path(),
        config.default_database(),
    ) {
        Ok(registry) => Arc::new(registry),
        Err(source) => {
            let error = BootstrapError::Registry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    reporter.bootstrap_succeeded(&config);
    Ok(Daemon {
        config,
        registry,
        telemetry,
        reporter,
    })
}
