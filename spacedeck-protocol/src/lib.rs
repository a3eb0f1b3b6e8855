//! Spacedeck controller link protocol
//!
//! This crate defines the serial protocol between the console host (a
//! Raspberry Pi) and the LED controller board. It is pure data: no I/O,
//! no allocation, usable from firmware and host alike.
//!
//! # Protocol Overview
//!
//! Every message is a COBS-encoded payload terminated by a single zero byte:
//! ```text
//! ┌────────────────────────────────────┬──────┐
//! │ COBS( OPCODE │ PAYLOAD ... )        │ 0x00 │
//! │        1B    │ 0–254B               │  1B  │
//! └────────────────────────────────────┴──────┘
//! ```
//!
//! The first decoded byte is always the opcode. The host sends commands
//! (`G`, `C`, `L`, `O`, `B`, `A`, `X`, `R`); the controller only ever answers
//! `G` with an `S` state report.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod color;
pub mod command;
pub mod frame;
pub mod response;
pub mod stuffing;

pub use color::Rgb;
pub use command::{Command, MAX_ARRAY_BYTES, MAX_BATCH_LEDS, SCALAR_OXYGEN};
pub use frame::{
    Frame, FrameAccumulator, FrameError, FRAME_TERMINATOR, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE,
    READ_BUFFER_SIZE,
};
pub use response::{ControllerResponse, StateReport};
