use hackwire_transport::TransportAddr;
use tracing::info;

use crate::error::Result;
use crate::peer::{Peer, PeerConfig};

/// Connect to a listening peer with the default (file-sync) configuration.
pub fn connect(addr: &TransportAddr) -> Result<Peer> {
    connect_with_config(addr, PeerConfig::default())
}

/// Connect with explicit configuration.
pub fn connect_with_config(addr: &TransportAddr, config: PeerConfig) -> Result<Peer> {
    let stream = hackwire_transport::connect(addr)?;
    info!(%addr, "connected to peer");
    Peer::from_stream(addr.to_string(), stream, config)
}
