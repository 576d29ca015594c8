//! Streaming binary wire protocol for real-time collaborative file sync.
//!
//! hackwire carries discrete, typed messages over any ordered, reliable byte
//! stream. A stream opens with a fixed handshake token; every frame after it
//! is an 8-byte header plus length-prefixed fields laid out by a catalog.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain socket and TCP byte streams
//! - [`frame`]: wire format, catalogs, encoder and incremental parser
//! - [`peer`]: duplex channels, file-sync/edit surfaces, connected peers
//!   (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use hackwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use hackwire_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use hackwire_peer::*;
}
