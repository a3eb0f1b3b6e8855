//! Background polling tasks
//!
//! Each poller runs on its own cadence and shares state with the main loop
//! only through the output stage, the pin bank and the controller gate.

pub mod controller;
pub mod panel;
pub mod poller;

pub use controller::ControllerPoller;
pub use panel::PanelPoller;
pub use poller::{spawn_poller, wait_until_warm, PollTask, PollerHandle, PollerOptions};
