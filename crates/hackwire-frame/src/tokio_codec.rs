//! `tokio_util::codec` adapter so the same parser runs inside `Framed`.

use std::sync::Arc;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::catalog::Catalog;
use crate::codec::{FrameConfig, FrameEncoder};
use crate::error::FrameError;
use crate::message::Message;
use crate::parser::FrameParser;

/// Decodes and encodes catalog messages over any `AsyncRead + AsyncWrite`.
#[derive(Debug)]
pub struct WireCodec {
    parser: FrameParser,
    encoder: FrameEncoder,
}

impl WireCodec {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_config(catalog, &FrameConfig::default())
    }

    pub fn with_config(catalog: Arc<Catalog>, config: &FrameConfig) -> Self {
        Self {
            parser: FrameParser::with_config(Arc::clone(&catalog), config),
            encoder: FrameEncoder::new(catalog, config),
        }
    }

    pub fn parser(&self) -> &FrameParser {
        &self.parser
    }
}

impl Decoder for WireCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if !src.is_empty() {
            self.parser.extend(src.split().freeze());
        }
        self.parser.next_message()
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if self.parser.is_mid_frame() => Err(FrameError::ConnectionClosed),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for WireCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encoder.encode_opcode(item.opcode, &item.fields, dst)
    }
}

impl Encoder<&Message> for WireCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encoder.encode_opcode(item.opcode, &item.fields, dst)
    }
}
