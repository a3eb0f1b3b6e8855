//! Length-prefixed message framing for the coordinator socket
//!
//! Wire format: 4-byte big-endian body length, then the UTF-8 JSON body.

use crate::error::SyncError;

/// Length prefix size
pub const HEADER_LEN: usize = 4;

/// Largest body accepted from the coordinator
pub const MAX_BODY_LEN: usize = 1 << 20;

/// Prefix `body` with its length
pub fn encode(body: &[u8]) -> Result<Vec<u8>, SyncError> {
    let len = u32::try_from(body.len())
        .map_err(|_| SyncError::Protocol(format!("outbound body of {} bytes", body.len())))?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(body);
    Ok(out)
}

/// Reassembles message bodies from arbitrary socket reads
///
/// Partial messages persist across reads; complete ones come out in
/// arrival order.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    buffer: Vec<u8>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw socket bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes waiting for the rest of their message
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Take the next complete body, if one is buffered
    ///
    /// A declared length above [`MAX_BODY_LEN`] is fatal for the stream.
    pub fn next_body(&mut self) -> Result<Option<Vec<u8>>, SyncError> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&self.buffer[..HEADER_LEN]);
        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_BODY_LEN {
            return Err(SyncError::Protocol(format!(
                "declared body length {} exceeds {}",
                len, MAX_BODY_LEN
            )));
        }

        if self.buffer.len() < HEADER_LEN + len {
            return Ok(None);
        }

        let body = self.buffer[HEADER_LEN..HEADER_LEN + len].to_vec();
        self.buffer.drain(..HEADER_LEN + len);
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_prefix() {
        let out = encode(b"{}").unwrap();
        assert_eq!(out, vec![0, 0, 0, 2, b'{', b'}']);
    }

    #[test]
    fn test_partial_message_waits() {
        let wire = encode(b"hello").unwrap();
        let mut buf = MessageBuffer::new();

        buf.extend(&wire[..2]);
        assert_eq!(buf.next_body().unwrap(), None);
        buf.extend(&wire[2..6]);
        assert_eq!(buf.next_body().unwrap(), None);
        buf.extend(&wire[6..]);
        assert_eq!(buf.next_body().unwrap(), Some(b"hello".to_vec()));
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn test_two_messages_in_one_read() {
        let mut wire = encode(b"one").unwrap();
        wire.extend(encode(b"two").unwrap());

        let mut buf = MessageBuffer::new();
        buf.extend(&wire);
        assert_eq!(buf.next_body().unwrap(), Some(b"one".to_vec()));
        assert_eq!(buf.next_body().unwrap(), Some(b"two".to_vec()));
        assert_eq!(buf.next_body().unwrap(), None);
    }

    #[test]
    fn test_empty_body() {
        let mut buf = MessageBuffer::new();
        buf.extend(&encode(b"").unwrap());
        assert_eq!(buf.next_body().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut buf = MessageBuffer::new();
        buf.extend(&((MAX_BODY_LEN as u32) + 1).to_be_bytes());
        assert!(matches!(buf.next_body(), Err(SyncError::Protocol(_))));
    }

    proptest! {
        #[test]
        fn prop_any_split_preserves_order(
            bodies in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 1..5),
            split in 0usize..400,
        ) {
            let wire: Vec<u8> = bodies.iter().flat_map(|b| encode(b).unwrap()).collect();
            let split = split.min(wire.len());

            let mut buf = MessageBuffer::new();
            let mut out = Vec::new();
            for part in [&wire[..split], &wire[split..]] {
                buf.extend(part);
                while let Some(body) = buf.next_body().unwrap() {
                    out.push(body);
                }
            }
            prop_assert_eq!(out, bodies);
        }
    }
}
