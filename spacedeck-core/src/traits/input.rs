//! Input source trait

/// Latest raw readings from the console's input peripherals
///
/// Implementations return cached values gathered by a polling task, so
/// every call is cheap and never blocks. `None` means the device or pin is
/// unknown or has not been read yet; the caller keeps its previous value.
pub trait InputSource {
    /// Level of a digital pin, `true` when active
    fn digital(&self, device: &str, pin: u8) -> Option<bool>;

    /// Analog channel scaled to `0.0..=1.0`
    fn analog(&self, device: &str, channel: u8) -> Option<f32>;
}
