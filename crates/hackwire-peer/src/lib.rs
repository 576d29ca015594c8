//! Duplex channels and peer connections for the hackwire protocol.
//!
//! This is the "just works" layer. A [`DuplexChannel`] turns the frame codec
//! into a bidirectional endpoint with a finish/destroy lifecycle; typed
//! surfaces cover the file-sync and edit catalogs; [`Peer`] runs a channel
//! over a connected Unix or TCP stream.

pub mod connector;
pub mod duplex;
pub mod edit;
pub mod error;
pub mod file_sync;
pub mod listener;
pub mod peer;

pub use connector::{connect, connect_with_config};
pub use duplex::{ChannelEvent, ChannelState, DuplexChannel};
pub use edit::{EditChannel, EditEvent};
pub use error::{PeerError, Result};
pub use file_sync::{FileSyncChannel, FileSyncEvent};
pub use listener::PeerListener;
pub use peer::{Peer, PeerConfig};
