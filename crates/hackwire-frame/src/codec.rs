use std::borrow::Cow;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use crate::catalog::{Catalog, FieldKind, MessageSpec};
use crate::error::{FrameError, Result};
use crate::handshake::HandshakeToken;
use crate::message::FieldValue;
use crate::wire::{self, DEFAULT_MAX_FIELD_SIZE};

/// Configuration shared by the encoder and parser.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum field size in bytes, enforced on encode and decode. Default: 16 MiB.
    pub max_field_size: usize,
    /// Token exchanged before the first frame. `None` sends and expects no token.
    pub handshake: Option<HandshakeToken>,
    /// Retry a failed structured decode once with the legacy `"}` suffix.
    ///
    /// Older encoders wrote structured lengths in characters rather than bytes,
    /// cutting multi-byte payloads short. Off by default.
    pub legacy_recovery: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_field_size: DEFAULT_MAX_FIELD_SIZE,
            handshake: Some(HandshakeToken::multihack()),
            legacy_recovery: false,
        }
    }
}

/// A validated frame whose payloads are ready to be written.
///
/// Everything that can fail (layout checks, JSON serialization, length
/// limits) happens while preparing, so writing never fails halfway.
#[derive(Debug)]
pub struct PreparedFrame<'a> {
    opcode: u8,
    payloads: Vec<(i32, Cow<'a, [u8]>)>,
}

impl PreparedFrame<'_> {
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Total bytes this frame occupies on the wire.
    pub fn wire_size(&self) -> usize {
        wire::frame_size(self.payloads.iter().map(|(_, payload)| payload.len()))
    }

    /// Append the frame to `dst`.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        wire::put_header(dst, self.opcode);
        for (len, payload) in &self.payloads {
            wire::put_wire_length(dst, *len);
            dst.put_slice(payload);
        }
    }
}

/// Validate `fields` against `spec` and serialize structured values.
///
/// Every payload, structured ones after serialization, must fit in
/// `max_field_size` bytes and in the 4-byte signed wire length.
pub fn prepare_frame<'a>(
    spec: &MessageSpec,
    fields: &'a [FieldValue],
    max_field_size: usize,
) -> Result<PreparedFrame<'a>> {
    let max = max_field_size.min(wire::MAX_WIRE_LENGTH);
    if fields.len() != spec.fields.len() {
        return Err(FrameError::FieldMismatch {
            message: spec.name.clone(),
            reason: format!("expected {} fields, got {}", spec.fields.len(), fields.len()),
        });
    }

    let mut payloads = Vec::with_capacity(fields.len());
    for (field, value) in spec.fields.iter().zip(fields) {
        let payload: Cow<'a, [u8]> = match (field.kind, value) {
            (FieldKind::Bytes, FieldValue::Bytes(bytes)) => Cow::Borrowed(bytes.as_ref()),
            (FieldKind::Bytes, FieldValue::Text(text)) => Cow::Borrowed(text.as_bytes()),
            (FieldKind::Text, FieldValue::Text(text)) => Cow::Borrowed(text.as_bytes()),
            (FieldKind::Structured, FieldValue::Structured(value)) => {
                Cow::Owned(serde_json::to_vec(value)?)
            }
            (kind, other) => {
                return Err(FrameError::FieldMismatch {
                    message: spec.name.clone(),
                    reason: format!(
                        "field '{}' expects {kind}, got {}",
                        field.name,
                        other.kind()
                    ),
                })
            }
        };
        let len = match i32::try_from(payload.len()) {
            Ok(len) if payload.len() <= max => len,
            _ => {
                return Err(FrameError::PayloadTooLarge {
                    size: payload.len(),
                    max,
                })
            }
        };
        payloads.push((len, payload));
    }

    Ok(PreparedFrame {
        opcode: spec.opcode,
        payloads,
    })
}

/// Encode the message called `name` into `dst`.
///
/// Only the wire limit applies; use [`FrameEncoder`] for a configured
/// `max_field_size`. On error nothing is written.
pub fn encode_frame(
    catalog: &Catalog,
    name: &str,
    fields: &[FieldValue],
    dst: &mut BytesMut,
) -> Result<()> {
    let spec = catalog
        .by_name(name)
        .ok_or_else(|| FrameError::UnknownMessageType(name.to_string()))?;
    prepare_frame(spec, fields, wire::MAX_WIRE_LENGTH)?.write_to(dst);
    Ok(())
}

/// Encode the message with `opcode` into `dst`.
pub fn encode_opcode(
    catalog: &Catalog,
    opcode: u8,
    fields: &[FieldValue],
    dst: &mut BytesMut,
) -> Result<()> {
    let spec = catalog
        .by_opcode(opcode)
        .ok_or_else(|| FrameError::UnknownMessageType(format!("opcode {opcode}")))?;
    prepare_frame(spec, fields, wire::MAX_WIRE_LENGTH)?.write_to(dst);
    Ok(())
}

/// Per-direction encoder state: the catalog, the field limit and the
/// handshake-sent flag.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    catalog: Arc<Catalog>,
    handshake: Option<HandshakeToken>,
    handshake_sent: bool,
    max_field_size: usize,
}

impl FrameEncoder {
    pub fn new(catalog: Arc<Catalog>, config: &FrameConfig) -> Self {
        Self {
            catalog,
            handshake: config.handshake.clone(),
            handshake_sent: false,
            max_field_size: config.max_field_size,
        }
    }

    /// Encode by message name, prefixing the handshake token on first use.
    pub fn encode(&mut self, name: &str, fields: &[FieldValue], dst: &mut BytesMut) -> Result<()> {
        let spec = self
            .catalog
            .by_name(name)
            .ok_or_else(|| FrameError::UnknownMessageType(name.to_string()))?;
        let frame = prepare_frame(spec, fields, self.max_field_size)?;
        self.put_handshake(dst);
        frame.write_to(dst);
        Ok(())
    }

    /// Encode by opcode, prefixing the handshake token on first use.
    pub fn encode_opcode(
        &mut self,
        opcode: u8,
        fields: &[FieldValue],
        dst: &mut BytesMut,
    ) -> Result<()> {
        let spec = self
            .catalog
            .by_opcode(opcode)
            .ok_or_else(|| FrameError::UnknownMessageType(format!("opcode {opcode}")))?;
        let frame = prepare_frame(spec, fields, self.max_field_size)?;
        self.put_handshake(dst);
        frame.write_to(dst);
        Ok(())
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn handshake_sent(&self) -> bool {
        self.handshake_sent
    }

    pub fn max_field_size(&self) -> usize {
        self.max_field_size
    }

    pub fn set_max_field_size(&mut self, max_field_size: usize) {
        self.max_field_size = max_field_size;
    }

    fn put_handshake(&mut self, dst: &mut BytesMut) {
        if self.handshake_sent {
            return;
        }
        if let Some(token) = &self.handshake {
            dst.put_slice(token.as_bytes());
        }
        self.handshake_sent = true;
    }
}
