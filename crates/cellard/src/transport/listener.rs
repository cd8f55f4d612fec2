//! Bound client socket and its accept thread.

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use cellar_config::SocketEndpoint;

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use std::os::unix::net::UnixListener;

#[cfg(unix)]
use self::unix::SocketFile;

/// Pause between polls while no client is waiting.
const IDLE_POLL: Duration = Duration::from_millis(25);
/// Pause after an accept error, so a persistent failure does not spin.
const FAULT_POLL: Duration = Duration::from_millis(150);

/// Listener bound to a client endpoint but not yet accepting.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    socket: BoundSocket,
}

#[derive(Debug)]
enum BoundSocket {
    Tcp(TcpListener),
    // The file guard is declared after the listener so the socket closes
    // before its path is unlinked.
    #[cfg(unix)]
    Unix(UnixListener, SocketFile),
}

impl BoundSocket {
    fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener, _) => listener.set_nonblocking(true),
        }
    }

    /// Accepts one pending client, or `None` when nobody is waiting.
    fn poll(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Self::Unix(listener, _) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

impl SocketListener {
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            endpoint: endpoint.to_string(),
            source,
        };
        let socket = match endpoint {
            SocketEndpoint::Tcp { host, port } => {
                BoundSocket::Tcp(TcpListener::bind((host.as_str(), *port)).map_err(bind_error)?)
            }
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => {
                let (listener, file) = unix::bind(path.as_std_path(), endpoint)?;
                BoundSocket::Unix(listener, file)
            }
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => {
                return Err(bind_error(io::Error::from(io::ErrorKind::Unsupported)));
            }
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            socket,
        })
    }

    /// Bound TCP address, which differs from the configured one when port 0
    /// was requested.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        match &self.socket {
            BoundSocket::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            BoundSocket::Unix(..) => None,
        }
    }

    pub(crate) fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Moves the listener onto its accept thread.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.socket
            .set_nonblocking()
            .map_err(|source| ListenerError::Start { source })?;
        let stop = Arc::new(AtomicBool::new(false));
        let accept_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("cellard-listener".to_owned())
            .spawn(move || self.accept_until(&accept_stop, &handler))
            .map_err(|source| ListenerError::Start { source })?;
        Ok(ListenerHandle {
            stop,
            thread: Some(thread),
        })
    }

    fn accept_until(self, stop: &AtomicBool, handler: &Arc<dyn ConnectionHandler>) {
        info!(target: LISTENER_TARGET, endpoint = %self.endpoint, "accepting clients");
        let mut accepted: u64 = 0;
        let mut failing = None::<io::ErrorKind>;
        while !stop.load(Ordering::SeqCst) {
            match self.socket.poll() {
                Ok(Some(stream)) => {
                    failing = None;
                    accepted += 1;
                    serve_connection(accepted, stream, handler);
                }
                Ok(None) => thread::sleep(IDLE_POLL),
                Err(error) => {
                    // Repeats of the same failure are logged once.
                    if failing.replace(error.kind()) != Some(error.kind()) {
                        warn!(target: LISTENER_TARGET, %error, "accept failed");
                    }
                    thread::sleep(FAULT_POLL);
                }
            }
        }
        debug!(target: LISTENER_TARGET, accepted, "stopped accepting clients");
    }
}

/// Handle to the background accept thread.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop. Connections already accepted keep
    /// running.
    pub(crate) fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept thread; a Unix socket file is gone afterwards.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        self.thread
            .take()
            .map_or(Ok(()), |thread| thread.join().map_err(|_| ListenerError::ThreadPanic))
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve_connection(sequence: u64, stream: ConnectionStream, handler: &Arc<dyn ConnectionHandler>) {
    let handler = Arc::clone(handler);
    if let Err(error) = thread::Builder::new()
        .name(format!("cellard-conn-{sequence}"))
        .spawn(move || handler.handle(stream))
    {
        warn!(target: LISTENER_TARGET, %error, sequence, "no thread for connection, closing it");
    }
}

#[cfg(unix)]
mod unix {
    use std::fs;
    use std::io;
    use std::os::unix::fs::FileTypeExt;
    use std::os::unix::net::{UnixListener, UnixStream};
    use std::path::{Path, PathBuf};

    use tracing::{debug, warn};

    use cellar_config::SocketEndpoint;

    use super::super::{LISTENER_TARGET, ListenerError, Occupant};

    /// Socket path owned by this process, unlinked on drop.
    #[derive(Debug)]
    pub(super) struct SocketFile(PathBuf);

    impl Drop for SocketFile {
        fn drop(&mut self) {
            match fs::remove_file(&self.0) {
                Ok(()) => debug!(target: LISTENER_TARGET, path = %self.0.display(), "removed socket file"),
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(error) => {
                    warn!(target: LISTENER_TARGET, path = %self.0.display(), %error, "failed to remove socket file");
                }
            }
        }
    }

    pub(super) fn bind(
        path: &Path,
        endpoint: &SocketEndpoint,
    ) -> Result<(UnixListener, SocketFile), ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            endpoint: endpoint.to_string(),
            source,
        };
        let occupied = |occupant| ListenerError::PathOccupied {
            path: path.display().to_string(),
            occupant,
        };

        match fs::symlink_metadata(path) {
            Ok(metadata) if !metadata.file_type().is_socket() => {
                return Err(occupied(Occupant::NotASocket));
            }
            Ok(_) => match UnixStream::connect(path) {
                Ok(_) => return Err(occupied(Occupant::LiveDaemon)),
                Err(error)
                    if matches!(
                        error.kind(),
                        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                    ) =>
                {
                    debug!(target: LISTENER_TARGET, path = %path.display(), "reclaiming stale socket");
                    fs::remove_file(path).map_err(bind_error)?;
                }
                Err(error) => return Err(bind_error(error)),
            },
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(bind_error(error)),
        }

        let listener = UnixListener::bind(path).map_err(bind_error)?;
        Ok((listener, SocketFile(path.to_path_buf())))
    }
}
