use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::time::Duration;

use hackwire_frame::{Catalog, FieldValue, FrameConfig, FrameError, Message};
use hackwire_transport::ByteStream;
use tracing::debug;

use crate::duplex::{ChannelEvent, ChannelState, DuplexChannel};
use crate::error::{PeerError, Result};
use crate::file_sync::FileSyncEvent;

const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Peer behavior configuration.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Catalog both sides speak. Default: file-sync.
    pub catalog: Arc<Catalog>,
    /// Framing configuration (handshake token, field limits, legacy recovery).
    pub frame: FrameConfig,
    /// Bytes requested from the transport per read.
    pub read_chunk_size: usize,
    /// Read timeout for the blocking pump. `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to the transport.
    pub write_timeout: Option<Duration>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            catalog: Arc::new(Catalog::file_sync()),
            frame: FrameConfig::default(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl PeerConfig {
    pub fn with_catalog(mut self, catalog: Arc<Catalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// A connected peer: a [`DuplexChannel`] over a [`ByteStream`] plus a
/// blocking pump that reads transport chunks until an event is available.
pub struct Peer {
    id: String,
    channel: DuplexChannel<ByteStream>,
    reader: ByteStream,
    config: PeerConfig,
}

impl Peer {
    /// Wrap an already-connected stream.
    pub fn from_stream(id: impl Into<String>, stream: ByteStream, config: PeerConfig) -> Result<Self> {
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        let reader = stream.try_clone()?;
        let channel = DuplexChannel::with_config(
            stream,
            Arc::clone(&config.catalog),
            config.frame.clone(),
        );

        let id = id.into();
        debug!(peer = %id, transport = reader.transport_name(), "peer ready");
        Ok(Self {
            id,
            channel,
            reader,
            config,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Encode and send a message by catalog name.
    pub fn send(&mut self, name: &str, fields: &[FieldValue]) -> Result<()> {
        Ok(self.channel.send(name, fields)?)
    }

    /// Encode and send a message by opcode.
    pub fn send_opcode(&mut self, opcode: u8, fields: &[FieldValue]) -> Result<()> {
        Ok(self.channel.send_opcode(opcode, fields)?)
    }

    /// Send a file-sync event. The peer must speak the file-sync catalog.
    pub fn send_file_sync(&mut self, event: &FileSyncEvent) -> Result<()> {
        self.send(event.name(), &event.to_fields())
    }

    /// Next channel event, reading from the transport as needed (blocking).
    ///
    /// End of stream destroys the channel, so the final event is
    /// [`ChannelEvent::Closed`]; calls after that return
    /// [`PeerError::Disconnected`]. End of stream inside a frame is reported as
    /// [`FrameError::ConnectionClosed`] first. A decode error destroys the
    /// channel after it is returned.
    pub fn recv_event(&mut self) -> Result<ChannelEvent> {
        let mut chunk = vec![0u8; self.config.read_chunk_size.max(1)];
        loop {
            if let Some(event) = self.channel.poll_event() {
                if matches!(event, ChannelEvent::Error(_)) {
                    // A failed stream cannot be resynchronized.
                    self.destroy();
                }
                return Ok(event);
            }
            if self.channel.is_destroyed() {
                return Err(PeerError::Disconnected(format!("{} is closed", self.id)));
            }

            let read = match self.reader.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(match self.config.read_timeout {
                        Some(timeout) => PeerError::Timeout(timeout),
                        None => PeerError::Frame(FrameError::Io(err)),
                    });
                }
                Err(err) => return Err(PeerError::Frame(FrameError::Io(err))),
            };

            if read == 0 {
                let mid_frame = self.channel.is_mid_frame();
                debug!(peer = %self.id, mid_frame, "peer closed the stream");
                self.channel.destroy();
                if mid_frame {
                    return Err(FrameError::ConnectionClosed.into());
                }
                continue;
            }

            self.channel.receive(chunk[..read].to_vec());
        }
    }

    /// Next inbound message (blocking). Decode errors and closure become errors.
    pub fn recv_message(&mut self) -> Result<Message> {
        loop {
            match self.recv_event()? {
                ChannelEvent::Message(message) => return Ok(message),
                ChannelEvent::Error(err) => return Err(err.into()),
                ChannelEvent::Finished => continue,
                ChannelEvent::Closed => {
                    return Err(PeerError::Disconnected(format!("{} closed", self.id)))
                }
            }
        }
    }

    /// Next inbound file-sync event (blocking).
    pub fn recv_file_sync(&mut self) -> Result<FileSyncEvent> {
        FileSyncEvent::try_from(self.recv_message()?)
    }

    /// Close the local write direction. The remote side reads end of stream
    /// once it has drained what was sent; inbound messages keep arriving.
    pub fn finish(&mut self) -> Result<()> {
        if self.channel.state() != ChannelState::Active {
            return Ok(());
        }
        self.channel.finish()?;
        self.channel.get_ref().shutdown_write()?;
        Ok(())
    }

    /// Tear the connection down. Idempotent.
    pub fn destroy(&mut self) {
        if self.channel.is_destroyed() {
            return;
        }
        self.channel.destroy();
        if let Err(err) = self.reader.shutdown() {
            debug!(peer = %self.id, error = %err, "shutdown after destroy failed");
        }
    }

    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.channel.catalog()
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        self.reader.transport_name()
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("transport", &self.reader.transport_name())
            .field("channel", &self.channel)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Write;
    use std::thread;

    use serde_json::json;

    use super::*;

    fn peer_pair() -> (Peer, Peer) {
        let (left, right) = ByteStream::pair().expect("socket pair");
        (
            Peer::from_stream("left", left, PeerConfig::default()).expect("left peer"),
            Peer::from_stream("right", right, PeerConfig::default()).expect("right peer"),
        )
    }

    #[test]
    fn request_and_reply() {
        let (mut client, mut server) = peer_pair();

        let handle = thread::spawn(move || {
            let request = server.recv_file_sync().expect("request");
            assert_eq!(request, FileSyncEvent::RequestProject);
            server
                .send_file_sync(&FileSyncEvent::ProvideFile {
                    path: "README.md".into(),
                    content: "# hi".into(),
                })
                .expect("reply");
            server
        });

        client.send_file_sync(&FileSyncEvent::RequestProject).unwrap();
        let reply = client.recv_file_sync().unwrap();
        assert_eq!(reply.path(), Some("README.md"));

        handle.join().expect("server thread");
    }

    #[test]
    fn finish_delivers_eof_as_closed() {
        let (mut client, mut server) = peer_pair();

        client
            .send("ChangeFile", &[FieldValue::from("x.js"), json!({"a": 1}).into()])
            .unwrap();
        client.finish().unwrap();
        assert!(client.send("RequestProject", &[]).is_err());

        let message = server.recv_message().unwrap();
        assert_eq!(message.name, "ChangeFile");
        assert!(matches!(server.recv_event().unwrap(), ChannelEvent::Closed));
        assert!(matches!(
            server.recv_event(),
            Err(PeerError::Disconnected(_))
        ));
    }

    #[test]
    fn eof_mid_frame_is_reported() {
        let (mut raw, stream) = ByteStream::pair().unwrap();
        let mut peer = Peer::from_stream("p", stream, PeerConfig::default()).unwrap();

        raw.write_all(b"\x13MultiHack protocol\x01\0\0").unwrap();
        drop(raw);

        let err = peer.recv_event().unwrap_err();
        assert!(matches!(err, PeerError::Frame(FrameError::ConnectionClosed)));
        assert_eq!(peer.state(), ChannelState::Destroyed);
    }

    #[test]
    fn garbage_surfaces_decode_error() {
        let (mut raw, stream) = ByteStream::pair().unwrap();
        let mut peer = Peer::from_stream("p", stream, PeerConfig::default()).unwrap();

        raw.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();

        let err = peer.recv_message().unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn read_timeout_is_reported() {
        let (_raw, stream) = ByteStream::pair().unwrap();
        let config = PeerConfig::default().with_read_timeout(Some(Duration::from_millis(20)));
        let mut peer = Peer::from_stream("p", stream, config).unwrap();

        let err = peer.recv_event().unwrap_err();
        assert!(matches!(err, PeerError::Timeout(_)));
    }

    #[test]
    fn destroy_is_idempotent() {
        let (mut peer, _other) = peer_pair();
        peer.destroy();
        peer.destroy();

        assert!(matches!(peer.recv_event().unwrap(), ChannelEvent::Closed));
        assert!(peer.recv_event().is_err());
        assert!(peer.send("RequestProject", &[]).is_err());
    }

    #[test]
    fn edit_catalog_peers() {
        let (left, right) = ByteStream::pair().unwrap();
        let config = PeerConfig::default().with_catalog(Arc::new(Catalog::edit()));
        let mut a = Peer::from_stream("a", left, config.clone()).unwrap();
        let mut b = Peer::from_stream("b", right, config).unwrap();

        a.send("Edit", &[json!({"insert": "x"}).into()]).unwrap();
        let message = b.recv_message().unwrap();
        assert_eq!(message.fields[0].as_structured(), Some(&json!({"insert": "x"})));
        assert!(a.send("RequestProject", &[]).is_err());
    }
}
