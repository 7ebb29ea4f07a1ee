use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::Endpoint;
use crate::error::{Result, TransportError};

/// TCP listening socket.
///
/// Provides bind/accept/connect for `tcp://` endpoints. The listener can be
/// switched to non-blocking mode so that accept loops can observe shutdown.
pub struct TcpEndpoint {
    listener: TcpListener,
    endpoint: Endpoint,
    local_addr: SocketAddr,
}

impl TcpEndpoint {
    /// Bind and listen on `endpoint`.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        let address = endpoint.to_string();
        let listener =
            TcpListener::bind(endpoint.socket_address()).map_err(|e| TransportError::Bind {
                address: address.clone(),
                source: e,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::Bind { address, source: e })?;

        info!(%endpoint, %local_addr, "listening on tcp endpoint");

        Ok(Self {
            listener,
            endpoint: endpoint.clone(),
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking unless non-blocking mode is set).
    pub fn accept(&self) -> Result<TcpStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        prepare_stream(&stream)?;
        debug!(%peer, "accepted connection");
        Ok(stream)
    }

    /// Accept a pending connection without waiting.
    ///
    /// Requires [`TcpEndpoint::set_nonblocking`] to have been enabled.
    pub fn try_accept(&self) -> Result<Option<TcpStream>> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(false)?;
                prepare_stream(&stream)?;
                debug!(%peer, "accepted connection");
                Ok(Some(stream))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// Toggle non-blocking accepts.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener.set_nonblocking(nonblocking)?;
        Ok(())
    }

    /// Connect to a listening endpoint, optionally bounded by `timeout`.
    pub fn connect(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<TcpStream> {
        let address = endpoint.to_string();
        let connect_err = |source: std::io::Error| TransportError::Connect {
            address: address.clone(),
            source,
        };

        let stream = match timeout {
            Some(timeout) => {
                let resolved = endpoint
                    .socket_address()
                    .to_socket_addrs()
                    .map_err(connect_err)?
                    .next()
                    .ok_or_else(|| {
                        connect_err(std::io::Error::new(
                            ErrorKind::NotFound,
                            "address resolved to nothing",
                        ))
                    })?;
                TcpStream::connect_timeout(&resolved, timeout).map_err(connect_err)?
            }
            None => TcpStream::connect(endpoint.socket_address()).map_err(connect_err)?,
        };
        prepare_stream(&stream)?;
        debug!(%endpoint, "connected to tcp endpoint");
        Ok(stream)
    }

    /// The configured endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

fn prepare_stream(stream: &TcpStream) -> Result<()> {
    stream.set_nodelay(true)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn loopback() -> Endpoint {
        Endpoint::parse("tcp://127.0.0.1:0").unwrap()
    }

    #[test]
    fn test_bind_accept_connect() {
        let listener = TcpEndpoint::bind(&loopback()).unwrap();
        let port = listener.local_addr().port();
        assert_ne!(port, 0);

        let handle = std::thread::spawn(move || {
            let target = Endpoint::parse(&format!("tcp://127.0.0.1:{port}")).unwrap();
            let mut client = TcpEndpoint::connect(&target, None).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_try_accept_without_pending_connection() {
        let listener = TcpEndpoint::bind(&loopback()).unwrap();
        listener.set_nonblocking(true).unwrap();
        assert!(listener.try_accept().unwrap().is_none());
    }

    #[test]
    fn test_connect_refused() {
        let listener = TcpEndpoint::bind(&loopback()).unwrap();
        let port = listener.local_addr().port();
        drop(listener);

        let target = Endpoint::parse(&format!("tcp://127.0.0.1:{port}")).unwrap();
        let result = TcpEndpoint::connect(&target, Some(Duration::from_millis(200)));
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_bind_address_in_use() {
        let first = TcpEndpoint::bind(&loopback()).unwrap();
        let taken =
            Endpoint::parse(&format!("tcp://127.0.0.1:{}", first.local_addr().port())).unwrap();
        let result = TcpEndpoint::bind(&taken);
        assert!(matches!(result, Err(TransportError::Bind { .. })));
        assert_eq!(first.transport_name(), "tcp");
    }
}
