//! Control catalog entries

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default level count for an analog input without an `analog` section
pub const DEFAULT_ANALOG_STEPS: u8 = 10;

/// Where a control reads its value from
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum InputRef {
    /// One pin on an I/O expander
    Digital { device: String, pin: u8 },
    /// One channel on an ADC
    Analog { device: String, channel: u8 },
}

impl InputRef {
    pub fn device(&self) -> &str {
        match self {
            InputRef::Digital { device, .. } | InputRef::Analog { device, .. } => device,
        }
    }

    pub fn is_analog(&self) -> bool {
        matches!(self, InputRef::Analog { .. })
    }
}

/// Level mapping and LED bar for an analog input
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalogConfig {
    /// Number of discrete levels reported (0..steps)
    pub steps: u8,
    /// First strip LED of the level bar, if the control has one
    #[cfg_attr(feature = "serde", serde(default))]
    pub first_led: Option<u8>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub led_count: u8,
}

impl Default for AnalogConfig {
    fn default() -> Self {
        Self {
            steps: DEFAULT_ANALOG_STEPS,
            first_led: None,
            led_count: 0,
        }
    }
}

/// One registered control
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControlConfig {
    /// Stable identifier shared with the coordinator
    pub id: String,
    pub input: InputRef,
    /// Single indicator LED
    #[cfg_attr(feature = "serde", serde(default))]
    pub light: Option<u8>,
    /// Up/down indicator LEDs
    #[cfg_attr(feature = "serde", serde(default))]
    pub lights: Option<[u8; 2]>,
    /// Sound played when the value changes
    #[cfg_attr(feature = "serde", serde(default))]
    pub sound: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub analog: Option<AnalogConfig>,
    /// Human wording used to generate on/off actions
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: Option<String>,
    /// State string → instruction the coordinator may issue
    #[cfg_attr(feature = "serde", serde(default))]
    pub actions: BTreeMap<String, String>,
}

impl ControlConfig {
    /// Create a plain digital control
    pub fn digital(id: &str, device: &str, pin: u8) -> Self {
        Self {
            id: id.to_string(),
            input: InputRef::Digital {
                device: device.to_string(),
                pin,
            },
            light: None,
            lights: None,
            sound: None,
            analog: None,
            description: None,
            actions: BTreeMap::new(),
        }
    }

    /// Create an analog control
    pub fn analog(id: &str, device: &str, channel: u8, steps: u8) -> Self {
        Self {
            input: InputRef::Analog {
                device: device.to_string(),
                channel,
            },
            analog: Some(AnalogConfig {
                steps,
                ..AnalogConfig::default()
            }),
            ..Self::digital(id, device, 0)
        }
    }

    /// Level mapping, defaulted for analog inputs without an explicit one
    pub fn analog_config(&self) -> Option<AnalogConfig> {
        match (&self.input, &self.analog) {
            (InputRef::Analog { .. }, Some(cfg)) => Some(cfg.clone()),
            (InputRef::Analog { .. }, None) => Some(AnalogConfig::default()),
            _ => None,
        }
    }

    /// Actions announced to the coordinator
    ///
    /// Explicit actions win. Otherwise an analog control gets one action per
    /// level and a described digital control gets an ON/OFF pair.
    pub fn resolved_actions(&self) -> BTreeMap<String, String> {
        if !self.actions.is_empty() {
            return self.actions.clone();
        }

        let mut actions = BTreeMap::new();
        if let Some(analog) = self.analog_config() {
            for level in 0..analog.steps {
                actions.insert(
                    format!("{}", level),
                    format!("Set {} to {}!", self.id, level),
                );
            }
        } else if let Some(description) = &self.description {
            actions.insert(
                String::from("True"),
                format!("Set the {} to ON", description),
            );
            actions.insert(
                String::from("False"),
                format!("Set the {} to OFF", description),
            );
        }
        actions
    }
}
