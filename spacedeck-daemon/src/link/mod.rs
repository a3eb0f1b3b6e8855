//! Serial link to the LED controller board

mod controller;
mod reset;
mod serial;

pub use controller::{ControllerLink, LinkOptions};
pub use reset::{NoResetLine, ResetLine, SysfsResetLine, RESET_PULSE};
pub use serial::SerialPort;

#[cfg(test)]
pub(crate) use controller::tests::spawn_fake_controller;
