//! Tests for the socket listener.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};

use cellar_config::SocketEndpoint;

use super::listener::{ListenerHandle, SocketListener};
use super::{ConnectionHandler, ConnectionStream, LineRead, ListenerError, Occupant, read_line};

/// Echoes every line back and counts the connections it served.
#[derive(Default)]
struct Echo {
    connections: AtomicUsize,
}

impl ConnectionHandler for Echo {
    fn handle(&self, stream: ConnectionStream) {
        self.connections.fetch_add(1, Ordering::SeqCst);
        let mut reader = BufReader::new(stream);
        while let Ok(LineRead::Line(line)) = read_line(&mut reader, 1024) {
            if reader.get_mut().write_all(&line).is_err() {
                break;
            }
        }
    }
}

impl Echo {
    fn served_at_least(&self, expected: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if self.connections.load(Ordering::SeqCst) >= expected {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

#[fixture]
fn echo() -> Arc<Echo> {
    Arc::new(Echo::default())
}

fn serve(endpoint: &SocketEndpoint, echo: &Arc<Echo>) -> (Option<std::net::SocketAddr>, ListenerHandle) {
    let listener = SocketListener::bind(endpoint).expect("bind");
    let addr = listener.local_addr();
    let handler: Arc<dyn ConnectionHandler> = Arc::clone(echo) as Arc<dyn ConnectionHandler>;
    (addr, listener.start(handler).expect("start"))
}

fn stop(handle: ListenerHandle) {
    handle.shutdown();
    handle.join().expect("accept thread joins");
}

#[rstest]
fn each_client_is_handed_to_the_handler(echo: Arc<Echo>) {
    let (addr, handle) = serve(&SocketEndpoint::tcp("127.0.0.1", 0), &echo);
    let addr = addr.expect("tcp listeners report their address");

    let _first = TcpStream::connect(addr).expect("first client");
    let _second = TcpStream::connect(addr).expect("second client");

    assert!(echo.served_at_least(2), "both clients should be served");
    stop(handle);
}

#[rstest]
fn one_connection_carries_several_lines(echo: Arc<Echo>) {
    let (addr, handle) = serve(&SocketEndpoint::tcp("127.0.0.1", 0), &echo);
    let mut client = TcpStream::connect(addr.expect("address")).expect("connect");
    let mut replies = BufReader::new(client.try_clone().expect("clone stream"));

    for line in ["[1]\n", "[2]\n", "[3]\n"] {
        client.write_all(line.as_bytes()).expect("write");
        let mut echoed = String::new();
        replies.read_line(&mut echoed).expect("read");
        assert_eq!(echoed, line);
    }
    stop(handle);
}

#[rstest]
fn a_taken_tcp_port_is_a_bind_error() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").expect("occupy a port");
    let port = taken.local_addr().expect("address").port();

    let error = SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", port))
        .expect_err("port is taken");
    assert!(matches!(error, ListenerError::Bind { .. }), "{error}");
}

#[cfg(unix)]
mod unix {
    use std::os::unix::net::{UnixListener, UnixStream};

    use tempfile::TempDir;

    use super::*;

    #[fixture]
    fn socket_dir() -> TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    fn endpoint_in(dir: &TempDir) -> (std::path::PathBuf, SocketEndpoint) {
        let path = dir.path().join("cellard.sock");
        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
        (path, endpoint)
    }

    #[rstest]
    fn stale_socket_is_reclaimed_and_removed_on_stop(socket_dir: TempDir, echo: Arc<Echo>) {
        let (path, endpoint) = endpoint_in(&socket_dir);
        drop(UnixListener::bind(&path).expect("leave a stale socket"));
        assert!(path.exists());

        let (_, handle) = serve(&endpoint, &echo);
        let _client = UnixStream::connect(&path).expect("connect");
        assert!(echo.served_at_least(1));

        stop(handle);
        assert!(!path.exists(), "socket file should be unlinked");
    }

    #[rstest]
    #[case::live(true, Occupant::LiveDaemon)]
    #[case::regular_file(false, Occupant::NotASocket)]
    fn occupied_paths_are_refused(
        socket_dir: TempDir,
        #[case] live_socket: bool,
        #[case] expected: Occupant,
    ) {
        let (path, endpoint) = endpoint_in(&socket_dir);
        let _live = if live_socket {
            Some(UnixListener::bind(&path).expect("live listener"))
        } else {
            std::fs::write(&path, b"not a socket").expect("write file");
            None
        };

        let error = SocketListener::bind(&endpoint).expect_err("path is occupied");
        assert!(
            matches!(error, ListenerError::PathOccupied { occupant, .. } if occupant == expected),
            "{error}"
        );
        assert!(path.exists(), "the occupant is left alone");
    }
}
