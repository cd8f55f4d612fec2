//! Connection abstractions shared by the listener and the broker frontend.

use std::io::{self, BufRead, Read, Write};
use std::net::TcpStream;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Stream types accepted by the listener.
pub(crate) enum ConnectionStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Serves one connection until the peer disconnects. Implementations
    /// should avoid panicking.
    fn handle(&self, stream: ConnectionStream);
}

/// Outcome of reading one request line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LineRead {
    /// A complete line, or the trailing bytes before end of stream.
    Line(Vec<u8>),
    /// The line grew past the size limit before a newline arrived.
    TooLarge,
    /// The peer closed the stream without sending anything.
    Closed,
}

/// Reads one newline-terminated line of at most `max_bytes` bytes.
pub(crate) fn read_line<R: BufRead>(reader: &mut R, max_bytes: usize) -> io::Result<LineRead> {
    let mut line = Vec::new();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX).saturating_add(1);
    loop {
        match reader.by_ref().take(limit).read_until(b'\n', &mut line) {
            Ok(_) => break,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }

    if line.len() > max_bytes {
        return Ok(LineRead::TooLarge);
    }
    if line.is_empty() {
        return Ok(LineRead::Closed);
    }
    Ok(LineRead::Line(line))
}
