//! Consistent Overhead Byte Stuffing
//!
//! Pure slice-to-slice wrappers over the `cobs` crate. The encoded form
//! never contains [`FRAME_TERMINATOR`](crate::FRAME_TERMINATOR), so a single
//! zero byte can delimit frames on the wire. Neither function appends or
//! expects the terminator itself.

use crate::frame::{FrameError, FRAME_TERMINATOR};

/// Encoding of the empty payload; `cobs` emits nothing for it
const EMPTY_ENCODING: u8 = 0x01;

/// Upper bound on the encoded size of `len` payload bytes
pub const fn max_encoded_len(len: usize) -> usize {
    let bound = cobs::max_encoding_length(len);
    if bound == 0 {
        1
    } else {
        bound
    }
}

/// Encode `src` into `dst`
///
/// Returns the number of bytes written. Fails with
/// [`FrameError::BufferTooSmall`] unless `dst` holds
/// [`max_encoded_len`]`(src.len())` bytes.
pub fn encode(src: &[u8], dst: &mut [u8]) -> Result<usize, FrameError> {
    if dst.len() < max_encoded_len(src.len()) {
        return Err(FrameError::BufferTooSmall);
    }
    if src.is_empty() {
        dst[0] = EMPTY_ENCODING;
        return Ok(1);
    }
    Ok(cobs::encode(src, dst))
}

/// Decode `src` (without its terminator) into `dst`
///
/// Returns the number of payload bytes written. Fails with
/// [`FrameError::InvalidEncoding`] on an embedded zero or a code byte that
/// points past the end of the input.
pub fn decode(src: &[u8], dst: &mut [u8]) -> Result<usize, FrameError> {
    if src.is_empty() || src.contains(&FRAME_TERMINATOR) {
        return Err(FrameError::InvalidEncoding);
    }
    if src == [EMPTY_ENCODING] {
        return Ok(0);
    }
    // Decoding only ever shrinks the input
    if dst.len() < src.len() {
        return Err(FrameError::BufferTooSmall);
    }
    cobs::decode(src, dst).map_err(|_| FrameError::InvalidEncoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode_vec(src: &[u8]) -> std::vec::Vec<u8> {
        let mut buf = [0u8; 300];
        let len = encode(src, &mut buf).unwrap();
        buf[..len].to_vec()
    }

    fn decode_vec(src: &[u8]) -> std::vec::Vec<u8> {
        let mut buf = [0u8; 300];
        let len = decode(src, &mut buf).unwrap();
        buf[..len].to_vec()
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(encode_vec(&[]), [0x01]);
        assert_eq!(encode_vec(&[0x00]), [0x01, 0x01]);
        assert_eq!(encode_vec(&[0x00, 0x00]), [0x01, 0x01, 0x01]);
        assert_eq!(encode_vec(&[0x11, 0x22, 0x00, 0x33]), [0x03, 0x11, 0x22, 0x02, 0x33]);
        assert_eq!(encode_vec(&[0x11, 0x22, 0x33, 0x44]), [0x05, 0x11, 0x22, 0x33, 0x44]);
        assert_eq!(encode_vec(&[0x11, 0x00, 0x00, 0x00]), [0x02, 0x11, 0x01, 0x01, 0x01]);
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        assert_eq!(decode_vec(&encode_vec(&[])), std::vec::Vec::<u8>::new());
    }

    #[test]
    fn test_full_block() {
        let src: std::vec::Vec<u8> = (1..=254).collect();
        let encoded = encode_vec(&src);
        assert_eq!(encoded[0], 0xFF);
        assert!(encoded.len() <= max_encoded_len(src.len()));
        assert_eq!(decode_vec(&encoded), src);
    }

    #[test]
    fn test_encoded_never_contains_zero() {
        let src = [0u8, 1, 0, 2, 0, 0, 3];
        assert!(!encode_vec(&src).contains(&0));
    }

    #[test]
    fn test_decode_rejects_embedded_zero() {
        let mut buf = [0u8; 8];
        assert_eq!(decode(&[0x03, 0x11, 0x00], &mut buf), Err(FrameError::InvalidEncoding));
        assert_eq!(decode(&[0x00], &mut buf), Err(FrameError::InvalidEncoding));
        assert_eq!(decode(&[], &mut buf), Err(FrameError::InvalidEncoding));
    }

    #[test]
    fn test_decode_rejects_overlong_code() {
        let mut buf = [0u8; 8];
        assert_eq!(decode(&[0x05, 0x11, 0x22], &mut buf), Err(FrameError::InvalidEncoding));
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let mut buf = [0u8; 3];
        assert_eq!(encode(&[1, 2, 3], &mut buf), Err(FrameError::BufferTooSmall));
        assert_eq!(encode(&[], &mut []), Err(FrameError::BufferTooSmall));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(payload in proptest::collection::vec(any::<u8>(), 0..=255)) {
            let mut encoded = [0u8; max_encoded_len(255)];
            let len = encode(&payload, &mut encoded).unwrap();
            prop_assert!(len <= max_encoded_len(payload.len()));
            prop_assert!(!encoded[..len].contains(&0));

            let mut decoded = [0u8; 300];
            let out = decode(&encoded[..len], &mut decoded).unwrap();
            prop_assert_eq!(&decoded[..out], &payload[..]);
        }
    }
}
