//! Events that trigger session transitions

use super::machine::ErrorKind;

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Controller reset pulse issued
    ResetRequested,
    /// Controller answered a state probe after reset
    ControllerReady,
    /// Polling tasks warmed up and the catalog went out
    LoopStarted,
    /// Operator or supervisor asked for shutdown
    StopRequested,
    /// Fatal error on any path
    Fault(ErrorKind),
    /// Sync session and polling tasks are down
    TeardownComplete,
}
