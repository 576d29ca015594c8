//! Catalog-driven binary framing for the hackwire file-sync protocol.
//!
//! This is the core layer of hackwire. A stream opens with a fixed handshake
//! token, then carries frames laid out as:
//! - An 8-byte header: 1 opcode byte + 7 reserved zero bytes
//! - Per variable field, a 32-byte length region (4-byte LE signed length +
//!   28 reserved zero bytes) followed by exactly `length` payload bytes
//!
//! Which fields follow an opcode is decided by a [`Catalog`]; the parser is
//! generic over it. Transport chunks may be split anywhere.

pub mod catalog;
pub mod codec;
pub mod error;
pub mod handshake;
pub mod message;
pub mod parser;
pub mod reader;
pub mod wire;
pub mod writer;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use catalog::{edit, file_sync, Catalog, CatalogBuilder, FieldKind, FieldSpec, MessageSpec};
pub use codec::{encode_frame, encode_opcode, prepare_frame, FrameConfig, FrameEncoder, PreparedFrame};
pub use error::{CatalogError, FrameError, Result};
pub use handshake::HandshakeToken;
pub use message::{FieldValue, Message};
pub use parser::FrameParser;
pub use reader::FrameReader;
pub use wire::{DEFAULT_MAX_FIELD_SIZE, HEADER_SIZE, LENGTH_REGION_SIZE};
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use tokio_codec::WireCodec;
