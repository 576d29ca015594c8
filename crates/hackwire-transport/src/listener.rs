use std::net::{TcpListener, TcpStream};

use tracing::{debug, info};

use crate::address::TransportAddr;
use crate::error::{Result, TransportError};
use crate::stream::ByteStream;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// A bound listener for any supported transport.
pub enum ByteListener {
    #[cfg(unix)]
    Unix(UnixDomainSocket),
    Tcp(TcpListener),
}

impl ByteListener {
    /// Bind a listener at `addr`.
    pub fn bind(addr: &TransportAddr) -> Result<Self> {
        match addr {
            #[cfg(unix)]
            TransportAddr::Unix(path) => Ok(ByteListener::Unix(UnixDomainSocket::bind(path)?)),
            #[cfg(not(unix))]
            TransportAddr::Unix(_) => Err(TransportError::Unsupported("unix-domain-socket")),
            TransportAddr::Tcp(sock) => {
                let listener = TcpListener::bind(sock).map_err(|source| TransportError::Bind {
                    addr: addr.to_string(),
                    source,
                })?;
                info!(addr = %sock, "listening on tcp");
                Ok(ByteListener::Tcp(listener))
            }
        }
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<ByteStream> {
        match self {
            #[cfg(unix)]
            ByteListener::Unix(socket) => socket.accept(),
            ByteListener::Tcp(listener) => {
                let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
                stream.set_nodelay(true)?;
                debug!(%peer, "accepted tcp connection");
                Ok(ByteStream::from_tcp(stream))
            }
        }
    }

    /// The address this listener is actually bound to.
    ///
    /// For TCP this reflects the kernel-assigned port when binding to port 0.
    pub fn local_addr(&self) -> Result<TransportAddr> {
        match self {
            #[cfg(unix)]
            ByteListener::Unix(socket) => Ok(TransportAddr::Unix(socket.path().to_path_buf())),
            ByteListener::Tcp(listener) => Ok(TransportAddr::Tcp(listener.local_addr()?)),
        }
    }
}

/// Connect to a listening peer at `addr` (blocking).
pub fn connect(addr: &TransportAddr) -> Result<ByteStream> {
    match addr {
        #[cfg(unix)]
        TransportAddr::Unix(path) => UnixDomainSocket::connect(path),
        #[cfg(not(unix))]
        TransportAddr::Unix(_) => Err(TransportError::Unsupported("unix-domain-socket")),
        TransportAddr::Tcp(sock) => {
            let stream = TcpStream::connect(sock).map_err(|source| TransportError::Connect {
                addr: addr.to_string(),
                source,
            })?;
            stream.set_nodelay(true)?;
            debug!(addr = %sock, "connected over tcp");
            Ok(ByteStream::from_tcp(stream))
        }
    }
}
