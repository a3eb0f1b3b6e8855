//! Liveness monitor implementation
//!
//! Tracks when the coordinator was last heard from. Time is passed in as a
//! millisecond tick so the monitor stays independent of any clock.

use crate::state::ErrorKind;

/// Default silence tolerated before the session is declared dead
pub const DEFAULT_THRESHOLD_MS: u64 = 10_000;

/// Health check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HealthStatus {
    /// Traffic seen within the threshold
    Ok,
    /// Condition violated
    Fault(ErrorKind),
}

/// Liveness monitor for the coordinator session
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    threshold_ms: u64,
    /// Tick of the most recent qualifying message
    last_seen_ms: Option<u64>,
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_MS)
    }
}

impl LivenessMonitor {
    /// Create a monitor that has not yet heard anything
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms,
            last_seen_ms: None,
        }
    }

    /// Record traffic at `now_ms`
    pub fn refresh(&mut self, now_ms: u64) {
        self.last_seen_ms = Some(now_ms);
    }

    /// Milliseconds since the last refresh
    pub fn silence_ms(&self, now_ms: u64) -> Option<u64> {
        self.last_seen_ms.map(|seen| now_ms.saturating_sub(seen))
    }

    /// True when traffic was seen within the threshold
    pub fn is_fresh(&self, now_ms: u64) -> bool {
        matches!(self.silence_ms(now_ms), Some(silence) if silence < self.threshold_ms)
    }

    /// Check session health
    pub fn check(&self, now_ms: u64) -> HealthStatus {
        if self.is_fresh(now_ms) {
            HealthStatus::Ok
        } else {
            HealthStatus::Fault(ErrorKind::SessionDead)
        }
    }
}
