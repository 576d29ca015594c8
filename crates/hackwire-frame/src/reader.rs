use std::io::{ErrorKind, Read};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::message::Message;
use crate::parser::FrameParser;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete messages from any `Read` stream.
///
/// Partial reads are buffered in a [`FrameParser`]; callers only ever see
/// complete messages.
pub struct FrameReader<T> {
    inner: T,
    parser: FrameParser,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a reader with default configuration.
    pub fn new(inner: T, catalog: Arc<Catalog>) -> Self {
        Self::with_config(inner, catalog, FrameConfig::default())
    }

    /// Create a reader with explicit configuration.
    pub fn with_config(inner: T, catalog: Arc<Catalog>, config: FrameConfig) -> Self {
        Self {
            inner,
            parser: FrameParser::with_config(catalog, &config),
            config,
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached, whether
    /// cleanly between frames or in the middle of one.
    pub fn read_message(&mut self) -> Result<Message> {
        loop {
            if let Some(message) = self.parser.next_message()? {
                return Ok(message);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if self.parser.is_mid_frame() {
                    tracing::debug!(
                        state = self.parser.state_name(),
                        buffered = self.parser.buffered(),
                        "stream ended inside a frame"
                    );
                }
                return Err(FrameError::ConnectionClosed);
            }

            self.parser.extend(chunk[..read].to_vec());
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

    /// Consume the reader and return the inner stream.
    ///
    /// Bytes buffered by the parser are lost.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// The parser driving this reader.
    pub fn parser(&self) -> &FrameParser {
        &self.parser
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Message>;

    /// Yields messages until the stream ends between frames.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_message() {
            Ok(message) => Some(Ok(message)),
            Err(FrameError::ConnectionClosed) if !self.parser.is_mid_frame() => None,
            Err(err) => Some(Err(err)),
        }
    }
}
