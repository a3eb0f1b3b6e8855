//! Pending output state
//!
//! The sampler and instruction handling write here; the polling tasks take
//! what changed and push it to the hardware. Nothing in the stage does I/O.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use spacedeck_core::config::OutputsConfig;
use spacedeck_core::outputs::{progress_colors, LedArray};
use spacedeck_core::traits::FeedbackSink;
use spacedeck_core::Instruction;
use spacedeck_protocol::{Rgb, MAX_ARRAY_BYTES, SCALAR_OXYGEN};

/// Oxygen gauge reading shown until told otherwise
pub const INITIAL_OXYGEN: u16 = 100;

/// Staged writes waiting for the polling tasks
#[derive(Debug)]
pub struct OutputStage {
    leds: BTreeMap<u8, Rgb>,
    array: LedArray,
    array_sent: Option<heapless::Vec<u8, MAX_ARRAY_BYTES>>,
    scalars: BTreeMap<u8, u16>,
    sounds: Vec<String>,
    display: String,
    status: Option<(String, Instant)>,
    progress_first_led: u8,
    progress_led_count: u8,
    status_hold: Duration,
}

impl OutputStage {
    pub fn new(config: &OutputsConfig) -> Self {
        let mut array = LedArray::new(config.array_chips);
        for &index in &config.array_always_on {
            array.set(index, true);
        }

        let mut scalars = BTreeMap::new();
        scalars.insert(SCALAR_OXYGEN, INITIAL_OXYGEN);

        Self {
            leds: BTreeMap::new(),
            array,
            array_sent: None,
            scalars,
            sounds: Vec::new(),
            display: String::new(),
            status: None,
            progress_first_led: config.progress_first_led,
            progress_led_count: config.progress_led_count,
            status_hold: Duration::from_millis(config.status_hold_ms as u64),
        }
    }

    /// Apply a coordinator instruction
    pub fn apply(&mut self, instruction: Instruction, now: Instant) {
        match instruction {
            Instruction::Display { text } => self.display = text,
            Instruction::Status { text } => self.status = Some((text, now + self.status_hold)),
            Instruction::Progress { value } => {
                let colors = progress_colors(value, self.progress_led_count as usize);
                self.set_leds(self.progress_first_led, &colors);
            }
        }
    }

    /// Text the display should show at `now`
    ///
    /// A status message overrides the display text until it expires.
    pub fn text(&self, now: Instant) -> &str {
        match &self.status {
            Some((status, until)) if now < *until => status,
            _ => &self.display,
        }
    }

    pub fn set_scalar(&mut self, tag: u8, value: u16) {
        self.scalars.insert(tag, value);
    }

    /// Take staged LEDs as runs of consecutive indices
    pub fn take_led_runs(&mut self) -> Vec<(u8, Vec<Rgb>)> {
        let mut runs: Vec<(u8, Vec<Rgb>)> = Vec::new();
        for (index, color) in std::mem::take(&mut self.leds) {
            match runs.last_mut() {
                Some((first, colors)) if *first as usize + colors.len() == index as usize => {
                    colors.push(color)
                }
                _ => runs.push((index, vec![color])),
            }
        }
        runs
    }

    /// Advance the pass counter and return the bitmap if it differs from
    /// the last one returned
    pub fn next_array(&mut self) -> Option<heapless::Vec<u8, MAX_ARRAY_BYTES>> {
        if self.array.chips() == 0 {
            return None;
        }
        self.array.advance_passes();
        let bitmap = self.array.bitmap();
        if self.array_sent.as_ref() == Some(bitmap) {
            return None;
        }
        self.array_sent = Some(bitmap.clone());
        Some(bitmap.clone())
    }

    /// The bitmap last returned by `next_array` never arrived
    pub fn forget_sent_array(&mut self) {
        self.array_sent = None;
    }

    pub fn take_scalars(&mut self) -> Vec<(u8, u16)> {
        std::mem::take(&mut self.scalars).into_iter().collect()
    }

    /// Put back LED runs the controller never received
    ///
    /// LEDs staged again in the meantime keep their newer color.
    pub fn restore_leds(&mut self, runs: &[(u8, Vec<Rgb>)]) {
        for (first, colors) in runs {
            for (index, color) in (*first..=u8::MAX).zip(colors) {
                self.leds.entry(index).or_insert(*color);
            }
        }
    }

    /// Put back scalar writes the controller never received
    pub fn restore_scalars(&mut self, scalars: &[(u8, u16)]) {
        for &(tag, value) in scalars {
            self.scalars.entry(tag).or_insert(value);
        }
    }

    pub fn take_sounds(&mut self) -> Vec<String> {
        std::mem::take(&mut self.sounds)
    }
}

impl FeedbackSink for OutputStage {
    fn set_led(&mut self, index: u8, color: Rgb) {
        self.leds.insert(index, color);
    }

    fn play_sound(&mut self, name: &str) {
        self.sounds.push(name.to_string());
    }
}
