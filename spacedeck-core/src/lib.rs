//! Hardware-agnostic logic for the console host
//!
//! This crate contains everything that does not touch a file descriptor:
//!
//! - Configuration types and catalog validation
//! - Controls with their capability set and local feedback
//! - Snapshot sampling and diffing
//! - Session lifecycle state machine
//! - Coordinator liveness tracking
//! - Inbound instruction queue
//! - Output models (LED array bitmap, progress bar)
//! - Collaborator traits for input sources and feedback sinks

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod config;
pub mod control;
pub mod health;
pub mod instructions;
pub mod outputs;
pub mod sampler;
pub mod state;
pub mod traits;

pub use control::{Capabilities, Control, Value};
pub use instructions::{Instruction, InstructionQueue};
pub use sampler::{diff, Diff, Snapshot, StateSampler};
