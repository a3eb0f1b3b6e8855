//! LED colors as sent on the wire

/// 8-bit RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 128, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const ORANGE: Rgb = Rgb::new(255, 165, 0);
    pub const LIME: Rgb = Rgb::new(0, 255, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale every channel by `max / 255`
    ///
    /// The controller drives the strip at full power, so the host caps
    /// brightness before transmission.
    pub fn scaled(self, max: u8) -> Self {
        let scale = |c: u8| ((c as u16 * max as u16) / 255) as u8;
        Self {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
        }
    }

    /// Wire representation
    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled() {
        assert_eq!(Rgb::new(255, 255, 255).scaled(180), Rgb::new(180, 180, 180));
        assert_eq!(Rgb::new(255, 0, 128).scaled(255), Rgb::new(255, 0, 128));
        assert_eq!(Rgb::RED.scaled(0), Rgb::BLACK);
    }
}
