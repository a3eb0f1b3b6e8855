//! Console configuration sections
//!
//! Every section has working defaults so a configuration file only needs
//! to name what differs from the stock console.

use alloc::string::String;
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::controls::ControlConfig;

/// Top-level console configuration
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConsoleConfig {
    pub serial: SerialConfig,
    pub sync: SyncConfig,
    pub scheduler: SchedulerConfig,
    pub outputs: OutputsConfig,
    /// Registered controls, in sampling order
    pub controls: Vec<ControlConfig>,
}

/// Controller board serial link
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SerialConfig {
    /// Device path
    pub port: String,
    pub baud_rate: u32,
    /// Bound on waiting for a response frame
    pub read_timeout_ms: u32,
    /// Bound on waiting for exclusive use of the port
    pub gate_timeout_ms: u32,
    /// Channel ceiling applied to every LED color (0-255)
    pub max_brightness: u8,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::from("/dev/ttyACM0"),
            baud_rate: 115_200,
            read_timeout_ms: 2000,
            gate_timeout_ms: 2000,
            max_brightness: 180,
        }
    }
}

/// Remote coordinator session
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SyncConfig {
    pub host: String,
    pub port: u16,
    /// Session is considered dead after this long without inbound traffic
    pub liveness_threshold_ms: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 8000,
            liveness_threshold_ms: 10_000,
        }
    }
}

/// Main loop and polling task timing
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerConfig {
    /// Main loop period
    pub cycle_ms: u32,
    /// Pause between polling passes
    pub poll_interval_ms: u32,
    /// Soft deadline for one polling pass; overruns are logged
    pub poll_deadline_ms: u32,
    /// State probes after a controller reset
    pub reset_attempts: u8,
    pub reset_retry_delay_ms: u32,
    /// Bound on waiting for every poller's first pass
    pub warmup_timeout_ms: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_ms: 20,
            poll_interval_ms: 10,
            poll_deadline_ms: 30,
            reset_attempts: 5,
            reset_retry_delay_ms: 100,
            warmup_timeout_ms: 2000,
        }
    }
}

/// Output devices driven through the controller
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OutputsConfig {
    /// Shift-register chips on the LED array (16 outputs each)
    pub array_chips: u8,
    /// Array outputs that are always lit
    pub array_always_on: Vec<u16>,
    /// First strip LED of the progress bar
    pub progress_first_led: u8,
    pub progress_led_count: u8,
    /// How long a status message overrides the display text
    pub status_hold_ms: u32,
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            array_chips: 5,
            array_always_on: Vec::new(),
            progress_first_led: 46,
            progress_led_count: 15,
            status_hold_ms: 2000,
        }
    }
}
