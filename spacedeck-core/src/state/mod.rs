//! Session lifecycle
//!
//! The scheduler's progress from power-on to shutdown is an explicit,
//! finite, deterministic state machine.

pub mod events;
pub mod machine;

pub use events::Event;
pub use machine::{ErrorKind, Session, State};
