/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] hackwire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] hackwire_frame::FrameError),

    /// Peer disconnected.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// A decoded message does not belong to the expected catalog.
    #[error("unexpected message '{got}' (expected {expected})")]
    UnexpectedMessage { expected: String, got: String },

    /// A blocking read hit the configured timeout.
    #[error("read timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl PeerError {
    /// True when the error came from the peer's byte stream being malformed.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, PeerError::Frame(err) if err.is_fatal())
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
