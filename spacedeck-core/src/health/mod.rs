//! Session health monitoring
//!
//! Detects a coordinator that has gone quiet.

pub mod liveness;

pub use liveness::{HealthStatus, LivenessMonitor};
