use std::fmt;

use bytes::Bytes;

/// The Multihack protocol token: length byte 0x13 followed by the 18-byte name.
const MULTIHACK_TOKEN: &[u8] = b"\x13MultiHack protocol";

/// Fixed byte sequence sent once per direction before the first frame.
///
/// Both ends must be configured with the same token; the first bytes a
/// channel receives are compared against it verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct HandshakeToken(Bytes);

impl HandshakeToken {
    /// The token used by every Multihack peer.
    pub fn multihack() -> Self {
        Self(Bytes::from_static(MULTIHACK_TOKEN))
    }

    /// A custom token. Must not be empty.
    pub fn new(token: impl Into<Bytes>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            return None;
        }
        Some(Self(token))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for HandshakeToken {
    fn default() -> Self {
        Self::multihack()
    }
}

impl fmt::Debug for HandshakeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandshakeToken({:?})", String::from_utf8_lossy(&self.0))
    }
}
