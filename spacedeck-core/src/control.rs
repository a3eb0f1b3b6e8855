//! Console controls
//!
//! One `Control` type covers every physical variant. What a control does
//! beyond reporting its value is decided by its [`Capabilities`], so a
//! single [`Control::sample`] handles plain switches, lit switches,
//! switches with up/down lights and analog inputs alike.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use spacedeck_protocol::Rgb;

use crate::config::{AnalogConfig, ControlConfig, InputRef};
use crate::traits::{FeedbackSink, InputSource};

/// Analog movement below this fraction of full scale is treated as jitter
pub const ANALOG_HYSTERESIS: f32 = 0.05;

/// Single light colors
pub const LIGHT_ACTIVE: Rgb = Rgb::GREEN;
pub const LIGHT_INACTIVE: Rgb = Rgb::ORANGE;

/// Up/down light colors
pub const UP_ON: Rgb = Rgb::GREEN;
pub const UP_OFF: Rgb = Rgb::RED;
pub const DOWN_ON: Rgb = Rgb::GREEN;
pub const DOWN_OFF: Rgb = Rgb::BLUE;

/// Analog level bar colors
pub const BAR_LIT: Rgb = Rgb::LIME;
pub const BAR_UNLIT: Rgb = Rgb::BLACK;

/// A sampled control value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Text(String),
}

impl fmt::Display for Value {
    /// The string form shared with the coordinator
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// What a control does besides reporting its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capabilities {
    pub has_light: bool,
    pub has_two_lights: bool,
    pub has_sound: bool,
    pub is_analog: bool,
}

impl Capabilities {
    /// Determine capabilities from a catalog entry
    pub fn from_config(config: &ControlConfig) -> Self {
        Self {
            has_light: config.light.is_some(),
            has_two_lights: config.lights.is_some(),
            has_sound: config.sound.is_some(),
            is_analog: config.input.is_analog(),
        }
    }
}

/// A registered control and its sampling state
#[derive(Debug, Clone)]
pub struct Control {
    id: String,
    input: InputRef,
    caps: Capabilities,
    light: Option<u8>,
    lights: Option<[u8; 2]>,
    sound: Option<String>,
    analog: Option<AnalogConfig>,
    actions: BTreeMap<String, String>,

    value: Value,
    /// Set after the first sample; lights are written on that sample,
    /// sounds only on later changes
    primed: bool,
    last_light: Option<Rgb>,
    /// Accepted analog reading, for hysteresis
    analog_ref: Option<f32>,
}

impl Control {
    /// Build a control from its catalog entry
    pub fn from_config(config: &ControlConfig) -> Self {
        let caps = Capabilities::from_config(config);
        let value = if caps.is_analog {
            Value::Int(0)
        } else {
            Value::Bool(false)
        };

        Self {
            id: config.id.clone(),
            input: config.input.clone(),
            caps,
            light: config.light,
            lights: config.lights,
            sound: config.sound.clone(),
            analog: config.analog_config(),
            actions: config.resolved_actions(),
            value,
            primed: false,
            last_light: None,
            analog_ref: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Most recently sampled value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Announced actions
    pub fn actions(&self) -> &BTreeMap<String, String> {
        &self.actions
    }

    /// Read the input and produce local feedback
    ///
    /// A failed read keeps the previous value.
    pub fn sample<I, F>(&mut self, input: &I, feedback: &mut F) -> &Value
    where
        I: InputSource + ?Sized,
        F: FeedbackSink + ?Sized,
    {
        let next = self.read(input);
        let changed = next != self.value;
        let first = !self.primed;
        self.value = next;
        self.primed = true;

        if self.caps.has_light {
            self.update_light(feedback);
        }
        if self.caps.has_two_lights && (changed || first) {
            self.update_two_lights(feedback);
        }
        if self.caps.is_analog && (changed || first) {
            self.update_bar(feedback);
        }
        if self.caps.has_sound && changed && !first {
            if let Some(sound) = &self.sound {
                feedback.play_sound(sound);
            }
        }

        &self.value
    }

    fn read<I: InputSource + ?Sized>(&mut self, input: &I) -> Value {
        match &self.input {
            InputRef::Digital { device, pin } => match input.digital(device, *pin) {
                Some(level) => Value::Bool(level),
                None => self.value.clone(),
            },
            InputRef::Analog { device, channel } => match input.analog(device, *channel) {
                Some(reading) => {
                    let reading = reading.clamp(0.0, 1.0);
                    let accepted = match self.analog_ref {
                        Some(prev) if abs_diff(prev, reading) < ANALOG_HYSTERESIS => prev,
                        _ => reading,
                    };
                    self.analog_ref = Some(accepted);
                    Value::Int(self.level_of(accepted))
                }
                None => self.value.clone(),
            },
        }
    }

    /// Map a scaled reading onto `0..steps`
    fn level_of(&self, reading: f32) -> i32 {
        let steps = self.analog.as_ref().map_or(1, |a| a.steps.max(1)) as i32;
        ((reading * steps as f32) as i32).min(steps - 1)
    }

    fn update_light<F: FeedbackSink + ?Sized>(&mut self, feedback: &mut F) {
        let Some(led) = self.light else { return };
        let color = if self.is_active() {
            LIGHT_ACTIVE
        } else {
            LIGHT_INACTIVE
        };
        if self.last_light != Some(color) {
            feedback.set_led(led, color);
            self.last_light = Some(color);
        }
    }

    fn update_two_lights<F: FeedbackSink + ?Sized>(&mut self, feedback: &mut F) {
        let Some([up, down]) = self.lights else { return };
        let (up_color, down_color) = if self.is_active() {
            (UP_ON, DOWN_OFF)
        } else {
            (UP_OFF, DOWN_ON)
        };
        feedback.set_led(up, up_color);
        feedback.set_led(down, down_color);
    }

    fn update_bar<F: FeedbackSink + ?Sized>(&mut self, feedback: &mut F) {
        let Some(analog) = &self.analog else { return };
        let Some(first) = analog.first_led else { return };
        if analog.led_count == 0 {
            return;
        }

        let level = match self.value {
            Value::Int(n) => n.max(0) as u32,
            _ => 0,
        };
        let count = analog.led_count as u32;
        let lit = ((level + 1) * count / analog.steps.max(1) as u32).min(count);
        let colors: Vec<Rgb> = (0..count)
            .map(|i| if i < lit { BAR_LIT } else { BAR_UNLIT })
            .collect();
        feedback.set_leds(first, &colors);
    }

    fn is_active(&self) -> bool {
        matches!(self.value, Value::Bool(true))
    }
}

fn abs_diff(a: f32, b: f32) -> f32 {
    if a > b {
        a - b
    } else {
        b - a
    }
}
