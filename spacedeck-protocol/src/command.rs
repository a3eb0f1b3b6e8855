//! Host → controller commands
//!
//! Every command is a single opcode byte followed by a fixed or bounded
//! argument list. Multi-byte integers are big-endian.

use heapless::Vec;

use crate::color::Rgb;
use crate::frame::{Frame, FrameError};

pub const OP_GET_STATE: u8 = b'G';
pub const OP_CLEAR_LEDS: u8 = b'C';
pub const OP_LATCH_LEDS: u8 = b'L';
pub const OP_SET_LED: u8 = b'O';
pub const OP_SET_LED_BATCH: u8 = b'B';
pub const OP_SET_ARRAY: u8 = b'A';
pub const OP_SET_SCALAR: u8 = b'X';
pub const OP_RESET: u8 = b'R';

/// LEDs carried by one `SetLedBatch` frame
pub const MAX_BATCH_LEDS: usize = 10;

/// Largest LED-array bitmap (16 outputs per chip, 16 chips)
pub const MAX_ARRAY_BYTES: usize = 32;

/// Scalar tag for the oxygen gauge
pub const SCALAR_OXYGEN: u8 = b'O';

/// Commands the host sends to the controller
///
/// Latching is not part of any command; the link follows a write with a
/// separate [`Command::LatchLeds`] when the caller asks for it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Request a state report
    GetState,
    /// Turn every LED off
    ClearLeds,
    /// Show staged LED values
    LatchLeds,
    /// Stage one LED
    SetLed { index: u8, color: Rgb },
    /// Stage up to [`MAX_BATCH_LEDS`] consecutive LEDs
    SetLedBatch {
        first: u8,
        colors: Vec<Rgb, MAX_BATCH_LEDS>,
    },
    /// Replace the whole LED-array bitmap
    SetArray { bitmap: Vec<u8, MAX_ARRAY_BYTES> },
    /// Set a tagged 16-bit output
    SetScalar { tag: u8, value: u16 },
    /// Reboot the controller
    Reset,
}

impl Command {
    /// Opcode for this command
    pub fn opcode(&self) -> u8 {
        match self {
            Command::GetState => OP_GET_STATE,
            Command::ClearLeds => OP_CLEAR_LEDS,
            Command::LatchLeds => OP_LATCH_LEDS,
            Command::SetLed { .. } => OP_SET_LED,
            Command::SetLedBatch { .. } => OP_SET_LED_BATCH,
            Command::SetArray { .. } => OP_SET_ARRAY,
            Command::SetScalar { .. } => OP_SET_SCALAR,
            Command::Reset => OP_RESET,
        }
    }

    /// Encode this command into a frame
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        match self {
            Command::GetState | Command::ClearLeds | Command::LatchLeds | Command::Reset => {
                Frame::with_opcode(self.opcode(), &[])
            }
            Command::SetLed { index, color } => {
                let [r, g, b] = color.to_bytes();
                Frame::with_opcode(OP_SET_LED, &[*index, r, g, b])
            }
            Command::SetLedBatch { first, colors } => {
                // Payload: [first][r g b]...
                let mut args = Vec::<u8, { 1 + 3 * MAX_BATCH_LEDS }>::new();
                args.push(*first).map_err(|_| FrameError::PayloadTooLarge)?;
                for color in colors {
                    args.extend_from_slice(&color.to_bytes())
                        .map_err(|_| FrameError::PayloadTooLarge)?;
                }
                Frame::with_opcode(OP_SET_LED_BATCH, &args)
            }
            Command::SetArray { bitmap } => Frame::with_opcode(OP_SET_ARRAY, bitmap),
            Command::SetScalar { tag, value } => {
                let [hi, lo] = value.to_be_bytes();
                Frame::with_opcode(OP_SET_SCALAR, &[*tag, hi, lo])
            }
        }
    }

    /// Decode a command from a frame
    pub fn from_frame(frame: &Frame) -> Result<Self, FrameError> {
        let opcode = frame.opcode();
        let args = frame.args();
        let bad_len = || FrameError::InvalidLength {
            opcode,
            len: args.len(),
        };

        match opcode {
            OP_GET_STATE | OP_CLEAR_LEDS | OP_LATCH_LEDS | OP_RESET => {
                if !args.is_empty() {
                    return Err(bad_len());
                }
                Ok(match opcode {
                    OP_GET_STATE => Command::GetState,
                    OP_CLEAR_LEDS => Command::ClearLeds,
                    OP_LATCH_LEDS => Command::LatchLeds,
                    _ => Command::Reset,
                })
            }
            OP_SET_LED => match args {
                [index, r, g, b] => Ok(Command::SetLed {
                    index: *index,
                    color: Rgb::new(*r, *g, *b),
                }),
                _ => Err(bad_len()),
            },
            OP_SET_LED_BATCH => {
                let (first, rest) = args.split_first().ok_or_else(bad_len)?;
                if rest.is_empty() || rest.len() % 3 != 0 || rest.len() / 3 > MAX_BATCH_LEDS {
                    return Err(bad_len());
                }
                let mut colors = Vec::new();
                for chunk in rest.chunks_exact(3) {
                    colors
                        .push(Rgb::new(chunk[0], chunk[1], chunk[2]))
                        .map_err(|_| bad_len())?;
                }
                Ok(Command::SetLedBatch {
                    first: *first,
                    colors,
                })
            }
            OP_SET_ARRAY => {
                let mut bitmap = Vec::new();
                bitmap.extend_from_slice(args).map_err(|_| bad_len())?;
                Ok(Command::SetArray { bitmap })
            }
            OP_SET_SCALAR => match args {
                [tag, hi, lo] => Ok(Command::SetScalar {
                    tag: *tag,
                    value: u16::from_be_bytes([*hi, *lo]),
                }),
                _ => Err(bad_len()),
            },
            other => Err(FrameError::UnexpectedOpcode(other)),
        }
    }
}
