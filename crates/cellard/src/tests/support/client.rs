//! Minimal line-oriented client used to drive a running daemon.

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use serde_json::{Value, json};

use crate::protocol::Response;

const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// A blocking TCP client speaking the JSON-lines protocol.
pub struct Client {
    reader: BufReader<TcpStream>,
}

impl Client {
    /// Connects to a daemon listening on `addr`.
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect to daemon");
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .expect("set read timeout");
        Self {
            reader: BufReader::new(stream),
        }
    }

    /// Sends one command and decodes the reply.
    pub fn request(&mut self, command: &str, database: Option<&str>, arguments: Value) -> Response {
        let mut descriptor = json!({ "command": command });
        if let Some(database) = database {
            descriptor["db"] = json!(database);
        }
        let line = serde_json::to_string(&json!([descriptor, arguments])).expect("encode request");
        self.send_raw(&line).expect("daemon replied")
    }

    /// Writes `line` plus a newline and reads one reply line.
    ///
    /// Returns `None` when the daemon closed the connection instead.
    pub fn send_raw(&mut self, line: &str) -> Option<Response> {
        let stream = self.reader.get_mut();
        stream.write_all(line.as_bytes()).expect("write request");
        stream.write_all(b"\n").expect("write newline");
        stream.flush().expect("flush request");
        self.read_reply()
    }

    /// Reads one reply line, or `None` at end of stream.
    pub fn read_reply(&mut self) -> Option<Response> {
        let mut reply = Vec::new();
        let read = self.reader.read_until(b'\n', &mut reply).expect("read reply");
        if read == 0 {
            return None;
        }
        Some(Response::parse(&reply).expect("well-formed reply"))
    }

    /// Half-closes the connection and checks that nothing else arrives.
    pub fn finish(mut self) {
        self.reader
            .get_ref()
            .shutdown(Shutdown::Write)
            .expect("half-close");
        assert!(self.read_reply().is_none(), "unexpected extra reply");
    }
}
