//! Session state machine definition

use super::events::Event;

/// Session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Nothing started yet
    Idle,
    /// Controller reset and state probing
    Resetting,
    /// Controller healthy; catalog being announced
    Announced,
    /// Sampling and dispatching
    Running,
    /// Guaranteed teardown in progress
    Stopping,
    /// Everything released
    Stopped,
}

/// Error taxonomy shared by every layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// Serial device or TCP endpoint could not be opened
    Connection,
    /// Malformed or unexpected frame or message
    Protocol,
    /// No response within the bound
    Timeout,
    /// Frame buffer filled without a terminator
    BufferOverflow,
    /// Coordinator session no longer live
    SessionDead,
}

impl State {
    /// Process an event and return the next state
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use State::*;

        match (self, event) {
            (Idle, ResetRequested) => Resetting,
            (Resetting, ControllerReady) => Announced,
            (Announced, LoopStarted) => Running,

            // Every live state tears down on stop or fault
            (Idle | Resetting | Announced | Running, StopRequested | Fault(_)) => Stopping,

            (Stopping, TeardownComplete) => Stopped,

            // Default: stay in current state
            _ => self,
        }
    }
}

/// Current state plus the fault that ended the session, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Session {
    state: State,
    fault: Option<ErrorKind>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            fault: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// First fault seen, kept through teardown
    pub fn fault(&self) -> Option<ErrorKind> {
        self.fault
    }

    /// Apply an event, returning the new state
    pub fn apply(&mut self, event: Event) -> State {
        let next = self.state.transition(event);
        if let Event::Fault(kind) = event {
            if next != self.state && self.fault.is_none() {
                self.fault = Some(kind);
            }
        }
        self.state = next;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut session = Session::new();
        assert_eq!(session.apply(Event::ResetRequested), State::Resetting);
        assert_eq!(session.apply(Event::ControllerReady), State::Announced);
        assert_eq!(session.apply(Event::LoopStarted), State::Running);
        assert_eq!(session.apply(Event::StopRequested), State::Stopping);
        assert_eq!(session.apply(Event::TeardownComplete), State::Stopped);
        assert_eq!(session.fault(), None);
    }

    #[test]
    fn test_fault_from_any_live_state() {
        let states = [State::Idle, State::Resetting, State::Announced, State::Running];

        for state in states {
            let next = state.transition(Event::Fault(ErrorKind::Timeout));
            assert_eq!(next, State::Stopping);
        }
    }

    #[test]
    fn test_fault_recorded_once() {
        let mut session = Session::new();
        session.apply(Event::ResetRequested);
        session.apply(Event::Fault(ErrorKind::Timeout));
        session.apply(Event::Fault(ErrorKind::SessionDead));
        assert_eq!(session.state(), State::Stopping);
        assert_eq!(session.fault(), Some(ErrorKind::Timeout));
    }

    #[test]
    fn test_out_of_order_events_ignored() {
        assert_eq!(State::Idle.transition(Event::LoopStarted), State::Idle);
        assert_eq!(State::Running.transition(Event::ControllerReady), State::Running);
        assert_eq!(State::Stopped.transition(Event::ResetRequested), State::Stopped);
        assert_eq!(State::Stopped.transition(Event::Fault(ErrorKind::Protocol)), State::Stopped);
    }
}
