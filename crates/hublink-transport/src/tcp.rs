use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use tracing::debug;

use crate::error::{Result, TransportError};

/// A connected TCP stream to a gateway.
///
/// Send coalescing (Nagle's algorithm) is disabled on connect; the protocol
/// exchanges many small packets and latency matters more than throughput.
pub struct GatewaySocket {
    inner: TcpStream,
}

impl GatewaySocket {
    /// Connect to a gateway (blocking).
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Connect {
                host: host.to_string(),
                port,
                source,
            })?
            .collect();

        let addr = addrs.first().ok_or_else(|| TransportError::Resolve {
            host: host.to_string(),
            port,
        })?;

        let stream = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
            host: host.to_string(),
            port,
            source,
        })?;
        stream.set_nodelay(true)?;

        debug!(host, port, "connected to gateway");
        Ok(Self { inner: stream })
    }

    /// Try to clone this socket (creates a new file descriptor).
    ///
    /// The connection engine hands the clone to a dedicated reader thread
    /// while keeping the original for writes.
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self { inner: cloned })
    }

    /// Shut down both directions of the stream.
    ///
    /// Idempotent: shutting down an already-closed socket is not an error.
    pub fn shutdown(&self) {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => debug!("socket shut down"),
            Err(err) if err.kind() == ErrorKind::NotConnected => {}
            Err(err) => debug!(?err, "socket shutdown failed"),
        }
    }

    /// The address of the connected gateway.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.peer_addr()?)
    }
}

impl Read for GatewaySocket {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for GatewaySocket {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for GatewaySocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySocket")
            .field("peer", &self.inner.peer_addr().ok())
            .finish()
    }
}

/// Whether a read error means the peer reset the connection.
///
/// The engine reports a reset separately from the regular close handling,
/// mirroring the two distinct events the transport can surface.
pub fn is_reset_by_peer(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn connect_and_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"hello");
            stream.write_all(b"world").unwrap();
        });

        let mut socket = GatewaySocket::connect("127.0.0.1", port).unwrap();
        socket.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        socket.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"world");

        server.join().unwrap();
    }

    #[test]
    fn connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = GatewaySocket::connect("127.0.0.1", port);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn clone_shares_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 2];
            stream.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"ab");
        });

        let socket = GatewaySocket::connect("127.0.0.1", port).unwrap();
        let mut writer = socket.try_clone().unwrap();
        writer.write_all(b"a").unwrap();
        let mut second = socket.try_clone().unwrap();
        second.write_all(b"b").unwrap();

        server.join().unwrap();
    }

    #[test]
    fn shutdown_unblocks_reader() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let socket = GatewaySocket::connect("127.0.0.1", port).unwrap();
        let mut reader = socket.try_clone().unwrap();
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 8];
            // EOF (Ok(0)) or an error; either way the read must return.
            let _ = reader.read(&mut buf);
        });

        socket.shutdown();
        handle.join().unwrap();

        let (_stream, _) = listener.accept().unwrap();
    }

    #[test]
    fn shutdown_twice_is_quiet() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let socket = GatewaySocket::connect("127.0.0.1", port).unwrap();
        socket.shutdown();
        socket.shutdown();

        let (_stream, _) = listener.accept().unwrap();
    }

    #[test]
    fn reset_classification() {
        let reset = std::io::Error::from(ErrorKind::ConnectionReset);
        let eof = std::io::Error::from(ErrorKind::UnexpectedEof);
        assert!(is_reset_by_peer(&reset));
        assert!(!is_reset_by_peer(&eof));
    }
}
