//! Byte-level layout.
//!
//! ```text
//! header (8B)                      variable field (32B + len)
//! ┌────────┬─────────────────┐    ┌───────────┬───────────────┬──────────────┐
//! │ opcode │ reserved (7B=0) │    │ len i32LE │ reserved 28B  │ payload      │
//! │ 1B     │                 │    │ 4B        │ zero-filled   │ (len bytes)  │
//! └────────┴─────────────────┘    └───────────┴───────────────┴──────────────┘
//! ```
//!
//! Reserved regions are written as zero and never inspected on read.

use bytes::BufMut;

use crate::error::{FrameError, Result};

/// Fixed frame header: opcode (1) + reserved (7).
pub const HEADER_SIZE: usize = 8;

/// Length region preceding every variable field: length (4) + reserved (28).
pub const LENGTH_REGION_SIZE: usize = 32;

const HEADER_RESERVED: [u8; HEADER_SIZE - 1] = [0; HEADER_SIZE - 1];
const LENGTH_RESERVED: [u8; LENGTH_REGION_SIZE - 4] = [0; LENGTH_REGION_SIZE - 4];

/// Largest length a 4-byte signed field can carry.
pub const MAX_WIRE_LENGTH: usize = i32::MAX as usize;

/// Default decode limit per field: 16 MiB.
pub const DEFAULT_MAX_FIELD_SIZE: usize = 16 * 1024 * 1024;

/// Write a frame header for `opcode`.
pub fn put_header(dst: &mut impl BufMut, opcode: u8) {
    dst.put_u8(opcode);
    dst.put_slice(&HEADER_RESERVED);
}

/// Write a length region announcing `len` payload bytes.
pub fn put_length_region(dst: &mut impl BufMut, len: usize) -> Result<()> {
    let wire_len = i32::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        size: len,
        max: MAX_WIRE_LENGTH,
    })?;
    put_wire_length(dst, wire_len);
    Ok(())
}

/// Write a length region for a length already checked to fit the wire.
pub fn put_wire_length(dst: &mut impl BufMut, len: i32) {
    dst.put_i32_le(len);
    dst.put_slice(&LENGTH_RESERVED);
}

/// Opcode from a header region. The reserved bytes are ignored.
pub fn read_opcode(header: &[u8]) -> u8 {
    header[0]
}

/// Signed length from a length region. The reserved bytes are ignored.
pub fn read_length(region: &[u8]) -> i32 {
    i32::from_le_bytes([region[0], region[1], region[2], region[3]])
}

/// Wire size of a frame whose variable fields have the given payload sizes.
pub fn frame_size(field_lens: impl IntoIterator<Item = usize>) -> usize {
    field_lens
        .into_iter()
        .fold(HEADER_SIZE, |acc, len| acc + LENGTH_REGION_SIZE + len)
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    #[test]
    fn header_is_opcode_then_zeroes() {
        let mut buf = BytesMut::new();
        put_header(&mut buf, 3);
        assert_eq!(buf.as_ref(), &[3, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(read_opcode(&buf), 3);
    }

    #[test]
    fn length_region_is_le_and_zero_padded() {
        let mut buf = BytesMut::new();
        put_length_region(&mut buf, 0x0102_0304).unwrap();
        assert_eq!(buf.len(), LENGTH_REGION_SIZE);
        assert_eq!(&buf[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert!(buf[4..].iter().all(|b| *b == 0));
        assert_eq!(read_length(&buf), 0x0102_0304);
    }

    #[test]
    fn reserved_bytes_are_ignored_on_read() {
        let mut region = [0xFFu8; LENGTH_REGION_SIZE];
        region[..4].copy_from_slice(&5i32.to_le_bytes());
        assert_eq!(read_length(&region), 5);

        let header = [2u8, 9, 9, 9, 9, 9, 9, 9];
        assert_eq!(read_opcode(&header), 2);
    }

    #[test]
    fn negative_lengths_read_back_signed() {
        let mut region = [0u8; LENGTH_REGION_SIZE];
        region[..4].copy_from_slice(&(-7i32).to_le_bytes());
        assert_eq!(read_length(&region), -7);
    }

    #[test]
    fn length_beyond_i32_is_rejected() {
        let mut buf = BytesMut::new();
        let err = put_length_region(&mut buf, MAX_WIRE_LENGTH + 1).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_size_counts_regions() {
        assert_eq!(frame_size(Vec::new()), HEADER_SIZE);
        assert_eq!(frame_size([9, 5]), 8 + 32 + 9 + 32 + 5);
    }
}
