//! Frame encoding and accumulation for the controller link.
//!
//! Frame format:
//! - BODY (1-256 bytes): COBS encoding of OPCODE + PAYLOAD
//! - TERMINATOR (1 byte): 0x00, never present inside BODY
//!
//! The decoded payload is never empty; its first byte is the opcode.

use heapless::Vec;

use crate::stuffing;

/// Frame delimiter byte
pub const FRAME_TERMINATOR: u8 = 0x00;

/// Maximum decoded payload size in bytes (opcode included)
pub const MAX_PAYLOAD_SIZE: usize = 254;

/// Maximum complete frame size (encoded body + terminator)
pub const MAX_FRAME_SIZE: usize = stuffing::max_encoded_len(MAX_PAYLOAD_SIZE) + 1;

/// Receive buffer size; a body that fills it without a terminator is discarded
pub const READ_BUFFER_SIZE: usize = 256;

/// Errors that can occur during frame encoding, decoding, or interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// A frame must carry at least an opcode
    EmptyPayload,
    /// Body is not valid COBS
    InvalidEncoding,
    /// Buffer too small for encoding
    BufferTooSmall,
    /// Receive buffer filled before a terminator arrived
    BufferOverflow,
    /// Opcode not valid in this position
    UnexpectedOpcode(u8),
    /// Payload length does not match the opcode
    InvalidLength { opcode: u8, len: usize },
}

/// A decoded or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded bytes, opcode first
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    /// Create a frame from raw payload bytes (opcode first)
    pub fn new(payload: &[u8]) -> Result<Self, FrameError> {
        if payload.is_empty() {
            return Err(FrameError::EmptyPayload);
        }

        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;

        Ok(Self {
            payload: payload_vec,
        })
    }

    /// Create a frame from an opcode and its arguments
    pub fn with_opcode(opcode: u8, args: &[u8]) -> Result<Self, FrameError> {
        let mut payload = Vec::<u8, MAX_PAYLOAD_SIZE>::new();
        payload.push(opcode).map_err(|_| FrameError::PayloadTooLarge)?;
        payload
            .extend_from_slice(args)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { payload })
    }

    /// Opcode byte
    pub fn opcode(&self) -> u8 {
        self.payload[0]
    }

    /// Payload bytes after the opcode
    pub fn args(&self) -> &[u8] {
        &self.payload[1..]
    }

    /// Decode a frame body (terminator already stripped)
    pub fn decode(body: &[u8]) -> Result<Self, FrameError> {
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        let len = stuffing::decode(body, &mut buffer).map_err(|e| match e {
            FrameError::BufferTooSmall => FrameError::PayloadTooLarge,
            other => other,
        })?;
        Self::new(&buffer[..len])
    }

    /// Encode this frame, terminator included, into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        if buffer.is_empty() {
            return Err(FrameError::BufferTooSmall);
        }
        let body_capacity = buffer.len() - 1;
        let len = stuffing::encode(&self.payload, &mut buffer[..body_capacity])?;
        buffer[len] = FRAME_TERMINATOR;
        Ok(len + 1)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode(&mut buffer)?;
        let mut vec = Vec::new();
        vec.extend_from_slice(&buffer[..len])
            .map_err(|_| FrameError::BufferTooSmall)?;
        Ok(vec)
    }
}

/// Collects raw bytes until a terminator completes a frame
///
/// The buffer is bounded. When it fills without a terminator the partial
/// body is discarded and [`FrameError::BufferOverflow`] returned; the start
/// of the next frame may have been lost with it, so one further decode
/// failure is possible before the stream is back in sync.
#[derive(Debug, Clone, Default)]
pub struct FrameAccumulator {
    buffer: Vec<u8, READ_BUFFER_SIZE>,
}

impl FrameAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Discard any partial frame
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of buffered body bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True when no partial frame is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Feed a single byte
    ///
    /// Returns `Ok(Some(frame))` when a terminator completes a valid frame,
    /// `Ok(None)` when more bytes are needed, or `Err` when the body was bad
    /// or the buffer overflowed. The buffer is empty after any `Err`.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        if byte == FRAME_TERMINATOR {
            // Back-to-back terminators carry nothing
            if self.buffer.is_empty() {
                return Ok(None);
            }
            let result = Frame::decode(&self.buffer);
            self.buffer.clear();
            return result.map(Some);
        }

        if self.buffer.push(byte).is_err() || self.buffer.is_full() {
            self.buffer.clear();
            return Err(FrameError::BufferOverflow);
        }
        Ok(None)
    }

    /// Feed multiple bytes
    ///
    /// Returns the first complete frame found, if any, along with the number
    /// of bytes consumed. Bytes after the frame are left for the next call.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<(Option<Frame>, usize), FrameError> {
        for (i, &byte) in bytes.iter().enumerate() {
            if let Some(frame) = self.feed(byte)? {
                return Ok((Some(frame), i + 1));
            }
        }
        Ok((None, bytes.len()))
    }
}
