//! Controller → host responses

use crate::frame::{Frame, FrameError};

pub const OP_STATE_REPORT: u8 = b'S';

/// Argument length without and with the throttle field
const REPORT_LEN: usize = 8;
const REPORT_LEN_THROTTLE: usize = 10;

/// Counters reported in answer to `GetState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateReport {
    /// Frames the controller accepted since boot
    pub commands_received: u32,
    /// Frames the controller rejected since boot
    pub bad_commands: u32,
    /// Current write throttle, when the firmware reports one
    pub throttle: Option<u16>,
}

impl StateReport {
    /// Parse a report frame
    pub fn from_frame(frame: &Frame) -> Result<Self, FrameError> {
        if frame.opcode() != OP_STATE_REPORT {
            return Err(FrameError::UnexpectedOpcode(frame.opcode()));
        }

        let args = frame.args();
        if args.len() != REPORT_LEN && args.len() != REPORT_LEN_THROTTLE {
            return Err(FrameError::InvalidLength {
                opcode: OP_STATE_REPORT,
                len: args.len(),
            });
        }

        let commands_received = u32::from_be_bytes([args[0], args[1], args[2], args[3]]);
        let bad_commands = u32::from_be_bytes([args[4], args[5], args[6], args[7]]);
        let throttle = (args.len() == REPORT_LEN_THROTTLE)
            .then(|| u16::from_be_bytes([args[8], args[9]]));

        Ok(Self {
            commands_received,
            bad_commands,
            throttle,
        })
    }

    /// Encode a report frame
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let mut args = [0u8; REPORT_LEN_THROTTLE];
        args[..4].copy_from_slice(&self.commands_received.to_be_bytes());
        args[4..8].copy_from_slice(&self.bad_commands.to_be_bytes());
        let len = match self.throttle {
            Some(throttle) => {
                args[8..].copy_from_slice(&throttle.to_be_bytes());
                REPORT_LEN_THROTTLE
            }
            None => REPORT_LEN,
        };
        Frame::with_opcode(OP_STATE_REPORT, &args[..len])
    }
}

/// Anything the controller may send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerResponse {
    StateReport(StateReport),
}

impl ControllerResponse {
    /// Decode a response frame
    pub fn from_frame(frame: &Frame) -> Result<Self, FrameError> {
        match frame.opcode() {
            OP_STATE_REPORT => StateReport::from_frame(frame).map(Self::StateReport),
            other => Err(FrameError::UnexpectedOpcode(other)),
        }
    }
}
