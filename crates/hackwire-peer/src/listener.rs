use std::sync::atomic::{AtomicU64, Ordering};

use hackwire_transport::{ByteListener, TransportAddr};
use tracing::debug;

use crate::error::Result;
use crate::peer::{Peer, PeerConfig};

/// Listens for and accepts peer connections.
pub struct PeerListener {
    listener: ByteListener,
    peer_config: PeerConfig,
    next_peer_id: AtomicU64,
}

impl PeerListener {
    /// Bind to a `unix:` path or `tcp:` socket address.
    pub fn bind(addr: &TransportAddr) -> Result<Self> {
        let listener = ByteListener::bind(addr)?;
        Ok(Self {
            listener,
            peer_config: PeerConfig::default(),
            next_peer_id: AtomicU64::new(1),
        })
    }

    /// Override peer behavior config for accepted peers.
    pub fn with_peer_config(mut self, config: PeerConfig) -> Self {
        self.peer_config = config;
        self
    }

    /// Accept next connection and assign an auto-generated peer id.
    pub fn accept(&self) -> Result<Peer> {
        let id = self.next_peer_id.fetch_add(1, Ordering::Relaxed);
        self.accept_with_id(&format!("peer-{id}"))
    }

    /// Accept next connection and use explicit peer id.
    pub fn accept_with_id(&self, peer_id: &str) -> Result<Peer> {
        let stream = self.listener.accept()?;
        debug!(peer = peer_id, "accepted peer");
        Peer::from_stream(peer_id, stream, self.peer_config.clone())
    }

    /// The address actually bound (kernel-assigned port for `tcp:...:0`).
    pub fn local_addr(&self) -> Result<TransportAddr> {
        Ok(self.listener.local_addr()?)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::connector::connect;

    #[cfg(unix)]
    fn make_sock_addr(tag: &str) -> TransportAddr {
        let dir = std::path::PathBuf::from(format!(
            "/tmp/hw-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        TransportAddr::Unix(dir.join("listener.sock"))
    }

    #[cfg(unix)]
    fn cleanup(addr: &TransportAddr) {
        if let TransportAddr::Unix(path) = addr {
            if let Some(parent) = path.parent() {
                let _ = std::fs::remove_dir_all(parent);
            }
        }
    }

    #[test]
    #[cfg(unix)]
    fn accept_returns_peer() {
        let addr = make_sock_addr("accept");
        let listener = PeerListener::bind(&addr).expect("listener should bind");

        let server = thread::spawn(move || {
            let peer = listener.accept().expect("listener should accept");
            assert_eq!(peer.id(), "peer-1");
            assert_eq!(peer.transport_name(), "unix-domain-socket");
        });

        let _client = connect(&addr).expect("client should connect");
        server.join().expect("server thread should finish");
        cleanup(&addr);
    }

    #[test]
    #[cfg(unix)]
    fn unix_round_trip() {
        let addr = make_sock_addr("roundtrip");
        let listener = PeerListener::bind(&addr).expect("listener should bind");

        let server = thread::spawn(move || {
            let mut peer = listener.accept().expect("listener should accept");
            peer.recv_message().expect("message should arrive")
        });

        let mut client = connect(&addr).expect("client should connect");
        client
            .send("DeleteFile", &[hackwire_frame::FieldValue::from("a.txt")])
            .unwrap();

        let message = server.join().expect("server thread should finish");
        assert_eq!(message.name, "DeleteFile");
        cleanup(&addr);
    }

    #[test]
    fn accepts_multiple_sequential_connections() {
        let listener = PeerListener::bind(&"tcp:127.0.0.1:0".parse().unwrap())
            .expect("listener should bind");
        let addr = listener.local_addr().expect("bound address");

        let server = thread::spawn(move || {
            let first = listener.accept().expect("first accept should succeed");
            let second = listener.accept().expect("second accept should succeed");
            assert_eq!(first.id(), "peer-1");
            assert_eq!(second.id(), "peer-2");
        });

        let _c1 = connect(&addr).expect("first client should connect");
        let _c2 = connect(&addr).expect("second client should connect");
        server.join().expect("server thread should finish");
    }

    #[test]
    fn peer_config_applies_to_accepted_peers() {
        let config = PeerConfig::default().with_catalog(std::sync::Arc::new(
            hackwire_frame::Catalog::edit(),
        ));
        let listener = PeerListener::bind(&"tcp:127.0.0.1:0".parse().unwrap())
            .expect("listener should bind")
            .with_peer_config(config);
        let addr = listener.local_addr().expect("bound address");

        let server = thread::spawn(move || {
            let peer = listener.accept().expect("accept should succeed");
            peer.catalog().len()
        });

        let _client = connect(&addr).expect("client should connect");
        assert_eq!(server.join().expect("server thread should finish"), 1);
    }
}
