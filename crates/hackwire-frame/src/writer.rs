use std::io::{ErrorKind, Write};
use std::sync::Arc;

use bytes::BytesMut;

use crate::catalog::Catalog;
use crate::codec::{FrameConfig, FrameEncoder};
use crate::error::{FrameError, Result};
use crate::message::{FieldValue, Message};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
///
/// The handshake token configured in [`FrameConfig`] goes out in front of the
/// first frame and never again.
pub struct FrameWriter<T> {
    inner: T,
    encoder: FrameEncoder,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T, catalog: Arc<Catalog>) -> Self {
        Self::with_config(inner, catalog, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, catalog: Arc<Catalog>, config: FrameConfig) -> Self {
        Self {
            inner,
            encoder: FrameEncoder::new(catalog, &config),
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send a message by catalog name.
    pub fn send(&mut self, name: &str, fields: &[FieldValue]) -> Result<()> {
        self.buf.clear();
        self.encoder.encode(name, fields, &mut self.buf)?;
        self.write_buffered()
    }

    /// Encode and send a message by opcode.
    pub fn send_opcode(&mut self, opcode: u8, fields: &[FieldValue]) -> Result<()> {
        self.buf.clear();
        self.encoder.encode_opcode(opcode, fields, &mut self.buf)?;
        self.write_buffered()
    }

    /// Write a decoded message back out, e.g. when relaying.
    pub fn write_message(&mut self, message: &Message) -> Result<()> {
        self.send_opcode(message.opcode, &message.fields)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Whether the handshake token has been written.
    pub fn handshake_sent(&self) -> bool {
        self.encoder.handshake_sent()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.encoder.catalog()
    }

    /// Update maximum field size for subsequent sends.
    pub fn set_max_field_size(&mut self, max_field_size: usize) {
        self.config.max_field_size = max_field_size;
        self.encoder.set_max_field_size(max_field_size);
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        tracing::trace!(bytes = offset, "frame written");
        self.flush()
    }
}
