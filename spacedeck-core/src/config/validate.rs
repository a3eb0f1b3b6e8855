//! Catalog validation

use alloc::collections::BTreeSet;
use alloc::string::String;
use core::fmt;

use spacedeck_protocol::MAX_ARRAY_BYTES;

use super::controls::{AnalogConfig, InputRef};
use super::types::ConsoleConfig;

/// Problems found while validating a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A control has an empty id
    EmptyId,
    /// Two controls share an id
    DuplicateId(String),
    /// A control names both `light` and `lights`
    ConflictingLights(String),
    /// A digital input carries an `analog` section
    AnalogOnDigital(String),
    /// An analog control reports zero levels
    ZeroSteps(String),
    /// More array chips than the wire format can address
    TooManyChips(u8),
    /// An always-on array index lies beyond the configured chips
    ArrayIndexOutOfRange(u16),
    /// An LED bar runs past the last strip index
    LedRunOutOfRange { owner: String, first: u8, count: u8 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyId => write!(f, "control with empty id"),
            ConfigError::DuplicateId(id) => write!(f, "duplicate control id `{}`", id),
            ConfigError::ConflictingLights(id) => {
                write!(f, "control `{}` sets both `light` and `lights`", id)
            }
            ConfigError::AnalogOnDigital(id) => {
                write!(f, "control `{}` has an analog section on a digital input", id)
            }
            ConfigError::ZeroSteps(id) => write!(f, "analog control `{}` has zero steps", id),
            ConfigError::TooManyChips(n) => write!(
                f,
                "{} array chips exceed the maximum of {}",
                n,
                MAX_ARRAY_BYTES / 2
            ),
            ConfigError::ArrayIndexOutOfRange(idx) => {
                write!(f, "always-on array output {} is out of range", idx)
            }
            ConfigError::LedRunOutOfRange { owner, first, count } => write!(
                f,
                "`{}` needs LEDs {}..{}, past the end of the strip",
                owner,
                first,
                *first as u16 + *count as u16
            ),
        }
    }
}

impl ConsoleConfig {
    /// Check the catalog and outputs for inconsistencies
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();

        for control in &self.controls {
            if control.id.is_empty() {
                return Err(ConfigError::EmptyId);
            }
            if !seen.insert(control.id.as_str()) {
                return Err(ConfigError::DuplicateId(control.id.clone()));
            }
            if control.light.is_some() && control.lights.is_some() {
                return Err(ConfigError::ConflictingLights(control.id.clone()));
            }
            match (&control.input, &control.analog) {
                (InputRef::Digital { .. }, Some(_)) => {
                    return Err(ConfigError::AnalogOnDigital(control.id.clone()));
                }
                (InputRef::Analog { .. }, Some(analog)) if analog.steps == 0 => {
                    return Err(ConfigError::ZeroSteps(control.id.clone()));
                }
                _ => {}
            }
            if let Some(AnalogConfig {
                first_led: Some(first),
                led_count,
                ..
            }) = &control.analog
            {
                check_led_run(&control.id, *first, *led_count)?;
            }
        }
        check_led_run(
            "progress bar",
            self.outputs.progress_first_led,
            self.outputs.progress_led_count,
        )?;

        let chips = self.outputs.array_chips;
        if chips as usize * 2 > MAX_ARRAY_BYTES {
            return Err(ConfigError::TooManyChips(chips));
        }
        let outputs = chips as u16 * 16;
        if let Some(&idx) = self.outputs.array_always_on.iter().find(|&&i| i >= outputs) {
            return Err(ConfigError::ArrayIndexOutOfRange(idx));
        }

        Ok(())
    }
}

/// Strip indices are a single byte
fn check_led_run(owner: &str, first: u8, count: u8) -> Result<(), ConfigError> {
    if first as u16 + count as u16 > u8::MAX as u16 + 1 {
        return Err(ConfigError::LedRunOutOfRange {
            owner: owner.into(),
            first,
            count,
        });
    }
    Ok(())
}
