//! The duplex channel adapter.
//!
//! One endpoint of a conversation: an encoder writing straight to the
//! transport and a parser turning inbound chunks into queued events.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use hackwire_frame::{Catalog, FieldValue, FrameConfig, FrameError, FrameParser, FrameWriter, Message};
use tracing::debug;

/// Lifecycle of a [`DuplexChannel`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Sending and receiving.
    Active,
    /// Local write side closed; inbound bytes are still decoded.
    Finishing,
    /// Torn down. Nothing succeeds and no event fires.
    Destroyed,
}

/// Discrete notification raised by a channel, in exact byte order.
#[derive(Debug)]
pub enum ChannelEvent<M = Message> {
    /// A complete inbound message.
    Message(M),
    /// The inbound stream hit a fatal decode error. Raised at most once.
    Error(FrameError),
    /// The local write side was finished.
    Finished,
    /// The channel was destroyed.
    Closed,
}

impl<M> ChannelEvent<M> {
    /// Convert the message payload, keeping lifecycle events as they are.
    pub fn try_map<N, F>(self, f: F) -> ChannelEvent<N>
    where
        F: FnOnce(M) -> Result<N, FrameError>,
    {
        match self {
            ChannelEvent::Message(message) => match f(message) {
                Ok(converted) => ChannelEvent::Message(converted),
                Err(err) => ChannelEvent::Error(err),
            },
            ChannelEvent::Error(err) => ChannelEvent::Error(err),
            ChannelEvent::Finished => ChannelEvent::Finished,
            ChannelEvent::Closed => ChannelEvent::Closed,
        }
    }

    pub fn as_message(&self) -> Option<&M> {
        match self {
            ChannelEvent::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChannelEvent::Message(_) => "message",
            ChannelEvent::Error(_) => "error",
            ChannelEvent::Finished => "finished",
            ChannelEvent::Closed => "closed",
        }
    }
}

/// A bidirectional protocol endpoint over any `Write` sink.
///
/// Outbound messages are encoded and written immediately. Inbound transport
/// chunks are handed to [`receive`](DuplexChannel::receive); completed
/// messages queue up as [`ChannelEvent`]s.
pub struct DuplexChannel<W> {
    writer: FrameWriter<W>,
    parser: Option<FrameParser>,
    events: VecDeque<ChannelEvent>,
    state: ChannelState,
}

impl<W: Write> DuplexChannel<W> {
    /// Create a channel with default configuration.
    pub fn new(writer: W, catalog: Arc<Catalog>) -> Self {
        Self::with_config(writer, catalog, FrameConfig::default())
    }

    /// Create a channel with explicit configuration.
    pub fn with_config(writer: W, catalog: Arc<Catalog>, config: FrameConfig) -> Self {
        let parser = FrameParser::with_config(Arc::clone(&catalog), &config);
        Self {
            writer: FrameWriter::with_config(writer, catalog, config),
            parser: Some(parser),
            events: VecDeque::new(),
            state: ChannelState::Active,
        }
    }

    /// Encode and write a message by catalog name.
    ///
    /// The handshake token precedes the first message. Encode errors are
    /// returned before anything is written.
    pub fn send(&mut self, name: &str, fields: &[FieldValue]) -> Result<(), FrameError> {
        self.ensure_writable()?;
        self.writer.send(name, fields)
    }

    /// Encode and write a message by opcode.
    pub fn send_opcode(&mut self, opcode: u8, fields: &[FieldValue]) -> Result<(), FrameError> {
        self.ensure_writable()?;
        self.writer.send_opcode(opcode, fields)
    }

    /// Feed one inbound transport chunk.
    ///
    /// Every message it completes is queued as [`ChannelEvent::Message`]. The
    /// first fatal decode error is queued as [`ChannelEvent::Error`]; later
    /// chunks are ignored. Ignored entirely once destroyed.
    pub fn receive(&mut self, chunk: impl Into<Bytes>) {
        let Some(parser) = self.parser.as_mut() else {
            return;
        };
        if parser.is_failed() {
            return;
        }

        let events = &mut self.events;
        if let Err(err) = parser.feed(chunk, |message| events.push_back(ChannelEvent::Message(message))) {
            self.events.push_back(ChannelEvent::Error(err));
        }
    }

    /// Next queued event, if any.
    pub fn poll_event(&mut self) -> Option<ChannelEvent> {
        self.events.pop_front()
    }

    /// All queued events, oldest first.
    pub fn drain_events(&mut self) -> Vec<ChannelEvent> {
        self.events.drain(..).collect()
    }

    /// Close the local write side. Inbound bytes are still decoded.
    ///
    /// Raises [`ChannelEvent::Finished`] the first time only.
    pub fn finish(&mut self) -> Result<(), FrameError> {
        if self.state != ChannelState::Active {
            return Ok(());
        }
        self.state = ChannelState::Finishing;
        self.events.push_back(ChannelEvent::Finished);
        debug!("channel write side finished");
        self.writer.flush()
    }

    /// Tear the channel down. Idempotent.
    ///
    /// Releases the accumulation buffer and parse state; a partially received
    /// frame is dropped. Raises [`ChannelEvent::Closed`] on the first call.
    pub fn destroy(&mut self) {
        if self.state == ChannelState::Destroyed {
            return;
        }
        if let Some(parser) = self.parser.take() {
            if parser.is_mid_frame() {
                debug!(
                    buffered = parser.buffered(),
                    "dropping partial frame on destroy"
                );
            }
        }
        self.state = ChannelState::Destroyed;
        self.events.push_back(ChannelEvent::Closed);
        debug!("channel destroyed");
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == ChannelState::Destroyed
    }

    /// True when a frame (or the handshake) is partially received.
    pub fn is_mid_frame(&self) -> bool {
        self.parser.as_ref().is_some_and(FrameParser::is_mid_frame)
    }

    /// Number of events waiting to be polled.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.writer.catalog()
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut W {
        self.writer.get_mut()
    }

    fn ensure_writable(&self) -> Result<(), FrameError> {
        match self.state {
            ChannelState::Active => Ok(()),
            ChannelState::Finishing | ChannelState::Destroyed => Err(FrameError::ChannelClosed),
        }
    }
}

impl<W> std::fmt::Debug for DuplexChannel<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexChannel")
            .field("state", &self.state)
            .field("parser", &self.parser)
            .field("pending_events", &self.events.len())
            .finish()
    }
}
