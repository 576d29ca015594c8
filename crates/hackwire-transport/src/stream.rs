use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected byte conduit. Implements `Read` and `Write`.
///
/// Ordered and reliable, with no message boundaries. Chunk sizes seen by
/// `read` are whatever the operating system hands back.
pub struct ByteStream {
    inner: ByteStreamInner,
}

enum ByteStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
}

impl Read for ByteStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            ByteStreamInner::Unix(stream) => stream.read(buf),
            ByteStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for ByteStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            ByteStreamInner::Unix(stream) => stream.write(buf),
            ByteStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            ByteStreamInner::Unix(stream) => stream.flush(),
            ByteStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl ByteStream {
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: ByteStreamInner::Unix(stream),
        }
    }

    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: ByteStreamInner::Tcp(stream),
        }
    }

    /// A connected in-process pair, handy for tests and loopback peers.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ByteStreamInner::Unix(stream) => stream.set_read_timeout(timeout)?,
            ByteStreamInner::Tcp(stream) => stream.set_read_timeout(timeout)?,
        }
        Ok(())
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ByteStreamInner::Unix(stream) => stream.set_write_timeout(timeout)?,
            ByteStreamInner::Tcp(stream) => stream.set_write_timeout(timeout)?,
        }
        Ok(())
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// Used to split one connection into a read half and a write half.
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = match &self.inner {
            #[cfg(unix)]
            ByteStreamInner::Unix(stream) => Self::from_unix(stream.try_clone()?),
            ByteStreamInner::Tcp(stream) => Self::from_tcp(stream.try_clone()?),
        };
        Ok(cloned)
    }

    /// Close the local write direction; the peer reads EOF once drained.
    pub fn shutdown_write(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ByteStreamInner::Unix(stream) => stream.shutdown(Shutdown::Write)?,
            ByteStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Write)?,
        }
        Ok(())
    }

    /// Close both directions.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ByteStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both)?,
            ByteStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both)?,
        }
        Ok(())
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            ByteStreamInner::Unix(_) => "unix-domain-socket",
            ByteStreamInner::Tcp(_) => "tcp",
        }
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
