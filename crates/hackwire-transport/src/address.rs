//! Transport address parsing.
//!
//! Addresses are written as `unix:<path>` or `tcp:<host:port>`. A bare value
//! containing a `/` is treated as a Unix socket path; anything else is tried
//! as a TCP socket address.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

const UNIX_PREFIX: &str = "unix:";
const TCP_PREFIX: &str = "tcp:";

/// Where a byte conduit listens or connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportAddr {
    /// Filesystem-path Unix domain socket.
    Unix(PathBuf),
    /// TCP socket address.
    Tcp(SocketAddr),
}

impl TransportAddr {
    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            TransportAddr::Unix(_) => "unix-domain-socket",
            TransportAddr::Tcp(_) => "tcp",
        }
    }
}

impl FromStr for TransportAddr {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid(input, "address must not be empty"));
        }

        if let Some(path) = trimmed.strip_prefix(UNIX_PREFIX) {
            if path.is_empty() {
                return Err(invalid(input, "unix socket path must not be empty"));
            }
            return Ok(TransportAddr::Unix(PathBuf::from(path)));
        }

        if let Some(addr) = trimmed.strip_prefix(TCP_PREFIX) {
            return resolve_tcp(input, addr).map(TransportAddr::Tcp);
        }

        if trimmed.contains('/') {
            return Ok(TransportAddr::Unix(PathBuf::from(trimmed)));
        }

        resolve_tcp(input, trimmed).map(TransportAddr::Tcp)
    }
}

impl fmt::Display for TransportAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportAddr::Unix(path) => write!(f, "{UNIX_PREFIX}{}", path.display()),
            TransportAddr::Tcp(addr) => write!(f, "{TCP_PREFIX}{addr}"),
        }
    }
}

fn resolve_tcp(input: &str, addr: &str) -> Result<SocketAddr, TransportError> {
    if let Ok(parsed) = addr.parse::<SocketAddr>() {
        return Ok(parsed);
    }
    addr.to_socket_addrs()
        .map_err(|err| invalid(input, &err.to_string()))?
        .next()
        .ok_or_else(|| invalid(input, "host resolved to no addresses"))
}

fn invalid(input: &str, reason: &str) -> TransportError {
    TransportError::InvalidAddress {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}
