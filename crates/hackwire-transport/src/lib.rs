//! Ordered, reliable byte conduits for hackwire.
//!
//! The wire protocol only assumes an ordered, lossless byte stream with no
//! message boundaries. This crate provides the conduits the rest of the
//! workspace runs on:
//! - Unix domain sockets (Linux/macOS)
//! - TCP
//!
//! Everything else builds on the [`ByteStream`] type provided here.

pub mod address;
pub mod error;
pub mod listener;
pub mod stream;

#[cfg(unix)]
pub mod uds;

pub use address::TransportAddr;
pub use error::{Result, TransportError};
pub use listener::{connect, ByteListener};
pub use stream::ByteStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
