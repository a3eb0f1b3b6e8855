//! Local feedback trait

use spacedeck_protocol::Rgb;

/// Receives the local feedback produced while sampling controls
///
/// Sampling never touches the serial port itself. Writes land in a stage
/// that a separate task flushes, so these calls must not block.
pub trait FeedbackSink {
    /// Stage one strip LED
    fn set_led(&mut self, index: u8, color: Rgb);

    /// Stage a run of consecutive strip LEDs
    ///
    /// Colors past the last strip index are dropped.
    fn set_leds(&mut self, first: u8, colors: &[Rgb]) {
        for (index, color) in (first..=u8::MAX).zip(colors) {
            self.set_led(index, *color);
        }
    }

    /// Queue a named sound
    fn play_sound(&mut self, name: &str);
}
