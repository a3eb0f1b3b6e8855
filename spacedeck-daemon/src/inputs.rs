//! Input readings shared between the panel poller and the sampler
//!
//! Peripheral drivers write their latest readings into a [`PinBank`]; the
//! sampler reads from it through [`InputSource`] without waiting on any
//! bus.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::RwLock;

use spacedeck_core::config::{ControlConfig, InputRef};
use spacedeck_core::traits::InputSource;

/// Device name for pins read through `/sys/class/gpio`
pub const SYSFS_GPIO_DEVICE: &str = "gpio";

type Key = (String, u8);

/// Latest reading of every known pin and channel
#[derive(Debug, Default)]
pub struct PinBank {
    digital: RwLock<HashMap<Key, bool>>,
    analog: RwLock<HashMap<Key, f32>>,
}

impl PinBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_digital(&self, device: &str, pin: u8, level: bool) {
        if let Ok(mut map) = self.digital.write() {
            map.insert((device.to_string(), pin), level);
        }
    }

    /// Store an analog reading, clamped to `0.0..=1.0`
    pub fn set_analog(&self, device: &str, channel: u8, reading: f32) {
        if let Ok(mut map) = self.analog.write() {
            map.insert((device.to_string(), channel), reading.clamp(0.0, 1.0));
        }
    }
}

impl InputSource for PinBank {
    fn digital(&self, device: &str, pin: u8) -> Option<bool> {
        self.digital.read().ok()?.get(&(device.to_string(), pin)).copied()
    }

    fn analog(&self, device: &str, channel: u8) -> Option<f32> {
        self.analog.read().ok()?.get(&(device.to_string(), channel)).copied()
    }
}

/// A peripheral polled by the panel task
pub trait InputDevice: Send {
    fn name(&self) -> &str;

    /// Read every pin this device owns into `bank`
    fn poll(&mut self, bank: &PinBank) -> impl Future<Output = io::Result<()>> + Send;
}

/// Digital inputs exported through `/sys/class/gpio`
///
/// Lines are active low: a `0` in the value file means pressed.
#[derive(Debug, Clone)]
pub struct SysfsGpioInputs {
    root: PathBuf,
    pins: Vec<u8>,
}

impl SysfsGpioInputs {
    pub fn new(pins: Vec<u8>) -> Self {
        Self::with_root("/sys/class/gpio", pins)
    }

    pub fn with_root(root: impl Into<PathBuf>, pins: Vec<u8>) -> Self {
        Self {
            root: root.into(),
            pins,
        }
    }

    /// Every digital pin the catalog reads from the sysfs device
    pub fn from_controls(controls: &[ControlConfig]) -> Self {
        let mut pins: Vec<u8> = controls
            .iter()
            .filter_map(|c| match &c.input {
                InputRef::Digital { device, pin } if device == SYSFS_GPIO_DEVICE => Some(*pin),
                _ => None,
            })
            .collect();
        pins.sort_unstable();
        pins.dedup();
        Self::new(pins)
    }

    pub fn pins(&self) -> &[u8] {
        &self.pins
    }
}

impl InputDevice for SysfsGpioInputs {
    fn name(&self) -> &str {
        SYSFS_GPIO_DEVICE
    }

    async fn poll(&mut self, bank: &PinBank) -> io::Result<()> {
        for &pin in &self.pins {
            let path = self.root.join(format!("gpio{}", pin)).join("value");
            let raw = tokio::fs::read_to_string(&path).await?;
            bank.set_digital(SYSFS_GPIO_DEVICE, pin, raw.trim() == "0");
        }
        Ok(())
    }
}
