/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream did not open with the expected protocol token.
    #[error("handshake mismatch (expected {expected}-byte protocol token)")]
    HandshakeMismatch { expected: usize },

    /// A frame header carries an opcode the catalog does not know.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    /// A field length is negative or larger than the configured maximum.
    #[error("invalid field length {len} (max {max})")]
    InvalidLength { len: i32, max: usize },

    /// A field payload could not be materialized.
    #[error("malformed payload in field '{field}': {reason}")]
    MalformedPayload { field: String, reason: String },

    /// The caller asked to encode a message type the catalog does not know.
    #[error("unknown message type '{0}'")]
    UnknownMessageType(String),

    /// The supplied field values do not match the catalog layout.
    #[error("field mismatch for '{message}': {reason}")]
    FieldMismatch { message: String, reason: String },

    /// A field exceeds what the 4-byte signed length can describe.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A structured value could not be serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The local write side is finished or the channel was destroyed.
    #[error("channel closed")]
    ChannelClosed,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Decode errors after which the inbound stream can no longer be trusted.
    ///
    /// The only recovery from a fatal error is tearing the channel down.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FrameError::HandshakeMismatch { .. }
                | FrameError::UnknownOpcode(_)
                | FrameError::InvalidLength { .. }
                | FrameError::MalformedPayload { .. }
        )
    }
}

/// Errors raised while building a [`Catalog`](crate::Catalog).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("opcode {0} is registered twice")]
    DuplicateOpcode(u8),

    #[error("message name '{0}' is registered twice")]
    DuplicateName(String),

    #[error("message '{message}' declares field '{field}' twice")]
    DuplicateField { message: String, field: String },
}

pub type Result<T> = std::result::Result<T, FrameError>;
