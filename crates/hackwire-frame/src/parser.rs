//! Incremental frame parser.
//!
//! The parser always knows exactly how many bytes its next step needs. Chunks
//! are queued by reference as they arrive; a step runs only once at least that
//! many bytes are buffered, and is handed exactly that many from the front.
//! Fragments are concatenated only when a step spans more than one of them.
//!
//! ```text
//! AwaitingHandshake ──▶ AwaitingOpcode ──▶ AwaitingFieldLength ──▶ AwaitingFieldPayload
//!                           ▲    │ (no fields)         ▲                     │
//!                           │    └──── emit ───────────┼─────── emit ◀───────┤ (last field)
//!                           └──────────────────────────┴─────────────────────┘
//! ```
//!
//! Any decode error moves the parser to a terminal failed state; later input
//! is dropped. There is no resynchronization.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::catalog::{Catalog, FieldKind, FieldSpec};
use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::handshake::HandshakeToken;
use crate::message::{FieldValue, Message};
use crate::wire::{self, HEADER_SIZE, LENGTH_REGION_SIZE};

/// Appended once to a structured payload that fails to parse, when legacy
/// recovery is enabled.
const LEGACY_RECOVERY_SUFFIX: &str = "\"}";

/// Parser cursor. Each variant carries the data valid in that state.
#[derive(Debug)]
enum ParseState {
    AwaitingHandshake,
    AwaitingOpcode,
    AwaitingFieldLength {
        entry: usize,
        index: usize,
        values: Vec<FieldValue>,
    },
    AwaitingFieldPayload {
        entry: usize,
        index: usize,
        values: Vec<FieldValue>,
    },
    Failed,
}

impl ParseState {
    fn name(&self) -> &'static str {
        match self {
            ParseState::AwaitingHandshake => "awaiting-handshake",
            ParseState::AwaitingOpcode => "awaiting-opcode",
            ParseState::AwaitingFieldLength { .. } => "awaiting-field-length",
            ParseState::AwaitingFieldPayload { .. } => "awaiting-field-payload",
            ParseState::Failed => "failed",
        }
    }
}

/// Reassembles messages from transport chunks of arbitrary size.
pub struct FrameParser {
    catalog: Arc<Catalog>,
    handshake: Option<HandshakeToken>,
    max_field_size: usize,
    legacy_recovery: bool,
    pending: VecDeque<Bytes>,
    pending_len: usize,
    required: usize,
    state: ParseState,
}

impl FrameParser {
    /// Create a parser with default configuration.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_config(catalog, &FrameConfig::default())
    }

    /// Create a parser with explicit configuration.
    pub fn with_config(catalog: Arc<Catalog>, config: &FrameConfig) -> Self {
        let (state, required) = match &config.handshake {
            Some(token) => (ParseState::AwaitingHandshake, token.len()),
            None => (ParseState::AwaitingOpcode, HEADER_SIZE),
        };
        Self {
            catalog,
            handshake: config.handshake.clone(),
            max_field_size: config.max_field_size,
            legacy_recovery: config.legacy_recovery,
            pending: VecDeque::new(),
            pending_len: 0,
            required,
            state,
        }
    }

    /// Queue a transport chunk. Nothing is parsed until [`next_message`] runs.
    ///
    /// Input is dropped once the parser has failed.
    ///
    /// [`next_message`]: FrameParser::next_message
    pub fn extend(&mut self, chunk: impl Into<Bytes>) {
        let chunk = chunk.into();
        if chunk.is_empty() || self.is_failed() {
            return;
        }
        self.pending_len += chunk.len();
        self.pending.push_back(chunk);
    }

    /// Run steps until a message completes or the buffer runs short.
    ///
    /// Returns `Ok(None)` when more bytes are needed. An error is returned
    /// exactly once; afterwards the parser is failed and yields `Ok(None)`.
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        while !self.is_failed() && self.pending_len >= self.required {
            let region = self.take_region();
            match self.step(region) {
                Ok(Some(message)) => return Ok(Some(message)),
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "fatal decode error; discarding inbound stream");
                    self.pending.clear();
                    self.pending_len = 0;
                    return Err(err);
                }
            }
        }
        Ok(None)
    }

    /// Queue `chunk` and drain it, handing each completed message to `on_message`.
    ///
    /// Messages completed before a fatal error in the same chunk are delivered
    /// before the error is returned.
    pub fn feed<F>(&mut self, chunk: impl Into<Bytes>, mut on_message: F) -> Result<()>
    where
        F: FnMut(Message),
    {
        self.extend(chunk);
        while let Some(message) = self.next_message()? {
            on_message(message);
        }
        Ok(())
    }

    /// Queue `chunk` and collect every message it completes.
    pub fn push(&mut self, chunk: impl Into<Bytes>) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        self.feed(chunk, |message| messages.push(message))?;
        Ok(messages)
    }

    /// Bytes the next step needs before it can run.
    pub fn required(&self) -> usize {
        self.required
    }

    /// Bytes queued but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.pending_len
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, ParseState::Failed)
    }

    /// True when a frame (or the handshake) has been partially received.
    pub fn is_mid_frame(&self) -> bool {
        match self.state {
            ParseState::AwaitingOpcode => self.pending_len > 0,
            ParseState::AwaitingHandshake => self.pending_len > 0,
            ParseState::Failed => false,
            _ => true,
        }
    }

    /// Name of the current state, for diagnostics.
    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Split exactly `required` bytes off the front of the queue.
    fn take_region(&mut self) -> Bytes {
        let required = self.required;
        if required == 0 {
            return Bytes::new();
        }

        let mut front = if self.pending.len() == 1 {
            self.pending.pop_front().unwrap_or_default()
        } else {
            let mut joined = BytesMut::with_capacity(self.pending_len);
            for fragment in self.pending.drain(..) {
                joined.extend_from_slice(&fragment);
            }
            joined.freeze()
        };

        let region = front.split_to(required);
        self.pending_len -= required;
        if !front.is_empty() {
            self.pending.push_front(front);
        }
        region
    }

    fn step(&mut self, region: Bytes) -> Result<Option<Message>> {
        // A failed step leaves the parser in `Failed`.
        match std::mem::replace(&mut self.state, ParseState::Failed) {
            ParseState::AwaitingHandshake => {
                let expected = self.handshake.as_ref().map(|t| t.as_bytes()).unwrap_or(&[]);
                if region.as_ref() != expected {
                    return Err(FrameError::HandshakeMismatch {
                        expected: expected.len(),
                    });
                }
                debug!("protocol handshake accepted");
                self.await_opcode();
                Ok(None)
            }
            ParseState::AwaitingOpcode => {
                let opcode = wire::read_opcode(&region);
                let entry = self
                    .catalog
                    .index_of_opcode(opcode)
                    .ok_or(FrameError::UnknownOpcode(opcode))?;
                trace!(opcode, name = self.catalog.opcode_name(opcode), "frame header");
                Ok(self.advance(entry, 0, Vec::new()))
            }
            ParseState::AwaitingFieldLength {
                entry,
                index,
                values,
            } => {
                let len = wire::read_length(&region);
                let size = usize::try_from(len).map_err(|_| FrameError::InvalidLength {
                    len,
                    max: self.max_field_size,
                })?;
                if size > self.max_field_size {
                    return Err(FrameError::InvalidLength {
                        len,
                        max: self.max_field_size,
                    });
                }
                self.required = size;
                self.state = ParseState::AwaitingFieldPayload {
                    entry,
                    index,
                    values,
                };
                Ok(None)
            }
            ParseState::AwaitingFieldPayload {
                entry,
                index,
                mut values,
            } => {
                let field = &self.catalog.entries()[entry].fields[index];
                values.push(decode_field(field, region, self.legacy_recovery)?);
                Ok(self.advance(entry, index + 1, values))
            }
            ParseState::Failed => Ok(None),
        }
    }

    /// Move to field `index` of `entry`, or emit the message if none remain.
    fn advance(&mut self, entry: usize, index: usize, values: Vec<FieldValue>) -> Option<Message> {
        let spec = &self.catalog.entries()[entry];
        if index < spec.fields.len() {
            self.required = LENGTH_REGION_SIZE;
            self.state = ParseState::AwaitingFieldLength {
                entry,
                index,
                values,
            };
            return None;
        }

        let message = Message::new(spec.opcode, spec.name.clone(), values);
        self.await_opcode();
        Some(message)
    }

    fn await_opcode(&mut self) {
        self.required = HEADER_SIZE;
        self.state = ParseState::AwaitingOpcode;
    }
}

impl std::fmt::Debug for FrameParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameParser")
            .field("state", &self.state.name())
            .field("required", &self.required)
            .field("buffered", &self.pending_len)
            .finish()
    }
}

fn decode_field(field: &FieldSpec, payload: Bytes, legacy_recovery: bool) -> Result<FieldValue> {
    match field.kind {
        FieldKind::Bytes => Ok(FieldValue::Bytes(payload)),
        FieldKind::Text => String::from_utf8(payload.to_vec())
            .map(FieldValue::Text)
            .map_err(|err| malformed(field, err)),
        FieldKind::Structured => {
            decode_structured(field, &payload, legacy_recovery).map(FieldValue::Structured)
        }
    }
}

fn decode_structured(
    field: &FieldSpec,
    payload: &[u8],
    legacy_recovery: bool,
) -> Result<serde_json::Value> {
    match serde_json::from_slice(payload) {
        Ok(value) => Ok(value),
        Err(err) if legacy_recovery => {
            debug!(field = %field.name, error = %err, "retrying structured payload with legacy suffix");
            let mut patched = String::from_utf8_lossy(payload).into_owned();
            patched.push_str(LEGACY_RECOVERY_SUFFIX);
            serde_json::from_str(&patched).map_err(|err| malformed(field, err))
        }
        Err(err) => Err(malformed(field, err)),
    }
}

fn malformed(field: &FieldSpec, reason: impl std::fmt::Display) -> FrameError {
    FrameError::MalformedPayload {
        field: field.name.clone(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;
    use serde_json::json;

    use super::*;
    use crate::codec::{encode_frame, FrameEncoder};

    fn file_sync() -> Arc<Catalog> {
        Arc::new(Catalog::file_sync())
    }

    fn encode_stream(messages: &[(&str, Vec<FieldValue>)]) -> BytesMut {
        let mut encoder = FrameEncoder::new(file_sync(), &FrameConfig::default());
        let mut buf = BytesMut::new();
        for (name, fields) in messages {
            encoder.encode(name, fields, &mut buf).unwrap();
        }
        buf
    }

    #[test]
    fn provide_file_one_byte_at_a_time() {
        let wire = encode_stream(&[(
            "ProvideFile",
            vec![FieldValue::from("a/test.js"), FieldValue::from("hello")],
        )]);

        let mut parser = FrameParser::new(file_sync());
        let mut decoded = Vec::new();
        for byte in wire.iter() {
            decoded.extend(parser.push(vec![*byte]).unwrap());
        }

        assert_eq!(decoded.len(), 1);
        let message = &decoded[0];
        assert_eq!(message.name, "ProvideFile");
        assert_eq!(message.fields[0].as_text(), Some("a/test.js"));
        assert_eq!(message.fields[1].as_bytes(), Some(&b"hello"[..]));
        assert!(!parser.is_mid_frame());
    }

    #[test]
    fn concatenated_frames_decode_in_order() {
        let wire = encode_stream(&[
            (
                "ChangeFile",
                vec![FieldValue::from("x.js"), FieldValue::from(json!({"a": 1}))],
            ),
            ("DeleteFile", vec![FieldValue::from("x.js")]),
        ]);

        let mut parser = FrameParser::new(file_sync());
        let messages = parser.push(wire.freeze()).unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].name, "ChangeFile");
        assert_eq!(messages[0].fields[1].as_structured(), Some(&json!({"a": 1})));
        assert_eq!(messages[1].name, "DeleteFile");
        assert_eq!(messages[1].fields[0].as_text(), Some("x.js"));
    }

    #[test]
    fn empty_layout_emits_on_header() {
        let wire = encode_stream(&[("RequestProject", vec![])]);
        let mut parser = FrameParser::new(file_sync());
        let messages = parser.push(wire.freeze()).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].fields.is_empty());
        assert_eq!(parser.required(), HEADER_SIZE);
    }

    #[test]
    fn required_tracks_each_step() {
        let token_len = HandshakeToken::multihack().len();
        let mut parser = FrameParser::new(file_sync());
        assert_eq!(parser.required(), token_len);
        assert_eq!(parser.state_name(), "awaiting-handshake");

        let wire = encode_stream(&[("DeleteFile", vec![FieldValue::from("abc")])]);
        let wire = wire.freeze();

        assert!(parser.push(wire.slice(..token_len)).unwrap().is_empty());
        assert_eq!(parser.required(), HEADER_SIZE);

        assert!(parser.push(wire.slice(token_len..token_len + HEADER_SIZE)).unwrap().is_empty());
        assert_eq!(parser.state_name(), "awaiting-field-length");
        assert_eq!(parser.required(), LENGTH_REGION_SIZE);

        let length_end = token_len + HEADER_SIZE + LENGTH_REGION_SIZE;
        assert!(parser.push(wire.slice(token_len + HEADER_SIZE..length_end)).unwrap().is_empty());
        assert_eq!(parser.state_name(), "awaiting-field-payload");
        assert_eq!(parser.required(), 3);

        let messages = parser.push(wire.slice(length_end..)).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(parser.state_name(), "awaiting-opcode");
    }

    #[test]
    fn zero_length_fields() {
        let wire = encode_stream(&[(
            "ProvideFile",
            vec![FieldValue::from(""), FieldValue::from(Vec::new())],
        )]);
        let mut parser = FrameParser::new(file_sync());
        let messages = parser.push(wire.freeze()).unwrap();
        assert_eq!(messages[0].fields[0].as_text(), Some(""));
        assert_eq!(messages[0].fields[1].as_bytes(), Some(&b""[..]));
    }

    #[test]
    fn multibyte_text_keeps_framing_in_sync() {
        let wire = encode_stream(&[
            ("DeleteFile", vec![FieldValue::from("ñandú/日本語.js")]),
            (
                "ChangeFile",
                vec![
                    FieldValue::from("é.js"),
                    FieldValue::from(json!({"text": "naïve — ☃"})),
                ],
            ),
        ]);
        let mut parser = FrameParser::new(file_sync());
        let messages = parser.push(wire.freeze()).unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].fields[0].as_text(), Some("ñandú/日本語.js"));
        assert_eq!(
            messages[1].fields[1].as_structured(),
            Some(&json!({"text": "naïve — ☃"}))
        );
    }

    #[test]
    fn handshake_mismatch_is_fatal() {
        let mut parser = FrameParser::new(file_sync());
        let mut wire = BytesMut::new();
        wire.put_slice(b"\x13NotHack protocol!!");
        encode_frame(&Catalog::file_sync(), "RequestProject", &[], &mut wire).unwrap();

        let err = parser.push(wire.freeze()).unwrap_err();
        assert!(matches!(err, FrameError::HandshakeMismatch { expected: 19 }));
        assert!(parser.is_failed());

        let later = encode_stream(&[("RequestProject", vec![])]);
        assert!(parser.push(later.freeze()).unwrap().is_empty());
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let config = FrameConfig {
            handshake: None,
            ..FrameConfig::default()
        };
        let mut parser = FrameParser::with_config(file_sync(), &config);
        let err = parser.push(vec![9u8, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, FrameError::UnknownOpcode(9)));
        assert!(parser.next_message().unwrap().is_none());
    }

    fn raw_parser(max_field_size: usize) -> FrameParser {
        let config = FrameConfig {
            handshake: None,
            max_field_size,
            ..FrameConfig::default()
        };
        FrameParser::with_config(file_sync(), &config)
    }

    fn delete_with_length(len: i32) -> BytesMut {
        let mut wire = BytesMut::new();
        wire::put_header(&mut wire, 2);
        wire.put_i32_le(len);
        wire.put_slice(&[0u8; LENGTH_REGION_SIZE - 4]);
        wire
    }

    #[test]
    fn negative_length_is_fatal() {
        let mut parser = raw_parser(1024);
        let err = parser.push(delete_with_length(-1).freeze()).unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength { len: -1, .. }));
    }

    #[test]
    fn oversized_length_is_fatal() {
        let mut parser = raw_parser(16);
        let err = parser.push(delete_with_length(17).freeze()).unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength { len: 17, max: 16 }));
    }

    #[test]
    fn invalid_utf8_text_is_malformed() {
        let mut parser = raw_parser(1024);
        let mut wire = delete_with_length(2);
        wire.put_slice(&[0xC3, 0x28]);
        let err = parser.push(wire.freeze()).unwrap_err();
        assert!(matches!(err, FrameError::MalformedPayload { field, .. } if field == "path"));
    }

    fn truncated_change() -> BytesMut {
        let mut wire = BytesMut::new();
        wire::put_header(&mut wire, 3);
        wire::put_length_region(&mut wire, 4).unwrap();
        wire.put_slice(b"t.js");
        let truncated = br#"{"text":"caf"#;
        wire::put_length_region(&mut wire, truncated.len()).unwrap();
        wire.put_slice(truncated);
        wire
    }

    #[test]
    fn malformed_structured_is_fatal_by_default() {
        let mut parser = raw_parser(1024);
        let err = parser.push(truncated_change().freeze()).unwrap_err();
        assert!(matches!(err, FrameError::MalformedPayload { field, .. } if field == "change"));
    }

    #[test]
    fn legacy_recovery_patches_truncated_payload() {
        let config = FrameConfig {
            handshake: None,
            legacy_recovery: true,
            ..FrameConfig::default()
        };
        let mut parser = FrameParser::with_config(file_sync(), &config);
        let messages = parser.push(truncated_change().freeze()).unwrap();
        assert_eq!(messages[0].fields[1].as_structured(), Some(&json!({"text": "caf"})));
    }

    #[test]
    fn legacy_recovery_retries_only_once() {
        let config = FrameConfig {
            handshake: None,
            legacy_recovery: true,
            ..FrameConfig::default()
        };
        let mut parser = FrameParser::with_config(file_sync(), &config);
        let mut wire = BytesMut::new();
        wire::put_header(&mut wire, 3);
        wire::put_length_region(&mut wire, 1).unwrap();
        wire.put_slice(b"p");
        wire::put_length_region(&mut wire, 3).unwrap();
        wire.put_slice(b"[[[");

        let err = parser.push(wire.freeze()).unwrap_err();
        assert!(matches!(err, FrameError::MalformedPayload { .. }));
    }

    #[test]
    fn messages_before_error_are_delivered() {
        let mut wire = encode_stream(&[("RequestProject", vec![])]);
        wire.put_slice(&[200u8, 0, 0, 0, 0, 0, 0, 0]);

        let mut parser = FrameParser::new(file_sync());
        let mut seen = Vec::new();
        let err = parser
            .feed(wire.freeze(), |message| seen.push(message.name))
            .unwrap_err();

        assert_eq!(seen, vec!["RequestProject".to_string()]);
        assert!(matches!(err, FrameError::UnknownOpcode(200)));
    }

    #[test]
    fn partial_frame_is_buffered_not_emitted() {
        let wire = encode_stream(&[(
            "ProvideFile",
            vec![FieldValue::from("big.bin"), FieldValue::from(vec![7u8; 1000])],
        )]);
        let wire = wire.freeze();

        let mut parser = FrameParser::new(file_sync());
        assert!(parser.push(wire.slice(..wire.len() - 1)).unwrap().is_empty());
        assert!(parser.is_mid_frame());
        assert_eq!(parser.required(), 1000);

        let messages = parser.push(wire.slice(wire.len() - 1..)).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn custom_catalog_round_trip() {
        let catalog = Arc::new(
            Catalog::builder()
                .message(
                    5,
                    "Blob",
                    [
                        FieldSpec::new("meta", FieldKind::Structured),
                        FieldSpec::new("data", FieldKind::Bytes),
                    ],
                )
                .build()
                .unwrap(),
        );
        let mut encoder = FrameEncoder::new(Arc::clone(&catalog), &FrameConfig::default());
        let mut wire = BytesMut::new();
        let fields = vec![
            FieldValue::from(json!({"mime": "application/octet-stream"})),
            FieldValue::from(vec![0u8, 1, 2, 255]),
        ];
        encoder.encode("Blob", &fields, &mut wire).unwrap();

        let mut parser = FrameParser::new(catalog);
        let messages = parser.push(wire.freeze()).unwrap();
        assert_eq!(messages[0].opcode, 5);
        assert_eq!(messages[0].fields, fields);
    }
}
