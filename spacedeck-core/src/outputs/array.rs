//! LED array on shift-register chips
//!
//! Each chip drives 16 outputs, two bytes of the bitmap. Output `i` is bit
//! `i % 8` of byte `i / 8`.

use heapless::Vec;

use spacedeck_protocol::MAX_ARRAY_BYTES;

/// Outputs per chip
pub const OUTPUTS_PER_CHIP: u16 = 16;

/// Pin on each chip reserved for the pass counter
pub const PASS_INDICATOR_PIN: u16 = 7;

/// Bitmap for the whole LED array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedArray {
    chips: u8,
    bitmap: Vec<u8, MAX_ARRAY_BYTES>,
    passes: u32,
}

impl LedArray {
    /// Create an all-off array; chips beyond the wire limit are ignored
    pub fn new(chips: u8) -> Self {
        let chips = chips.min((MAX_ARRAY_BYTES / 2) as u8);
        let mut bitmap = Vec::new();
        // Cannot fail: clamped to capacity above
        let _ = bitmap.resize(chips as usize * 2, 0);
        Self {
            chips,
            bitmap,
            passes: 0,
        }
    }

    pub fn chips(&self) -> u8 {
        self.chips
    }

    /// Number of addressable outputs
    pub fn outputs(&self) -> u16 {
        self.chips as u16 * OUTPUTS_PER_CHIP
    }

    /// Switch one output; returns false if the index is out of range
    pub fn set(&mut self, index: u16, on: bool) -> bool {
        if index >= self.outputs() {
            return false;
        }
        let byte = (index >> 3) as usize;
        let bit = 1u8 << (index % 8);
        if on {
            self.bitmap[byte] |= bit;
        } else {
            self.bitmap[byte] &= !bit;
        }
        true
    }

    pub fn is_on(&self, index: u16) -> bool {
        index < self.outputs() && self.bitmap[(index >> 3) as usize] & (1 << (index % 8)) != 0
    }

    /// Advance the pass counter shown on the indicator pins
    ///
    /// The counter wraps at `2^chips`; the first chip shows the most
    /// significant bit.
    pub fn advance_passes(&mut self) {
        let modulus = 1u64 << self.chips;
        self.passes = ((self.passes as u64 + 1) % modulus) as u32;

        for chip in 0..self.chips {
            let bit = self.chips - 1 - chip;
            let on = self.passes >> bit & 1 == 1;
            self.set(PASS_INDICATOR_PIN + OUTPUTS_PER_CHIP * chip as u16, on);
        }
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Bitmap as sent in a `SetArray` command
    pub fn bitmap(&self) -> &Vec<u8, MAX_ARRAY_BYTES> {
        &self.bitmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_layout() {
        let mut array = LedArray::new(2);
        assert_eq!(array.bitmap().len(), 4);

        assert!(array.set(0, true));
        assert!(array.set(9, true));
        assert!(array.set(31, true));
        assert_eq!(&array.bitmap()[..], &[0x01, 0x02, 0x00, 0x80]);

        assert!(array.set(9, false));
        assert_eq!(array.bitmap()[1], 0x00);
        assert!(array.is_on(31));
    }

    #[test]
    fn test_out_of_range() {
        let mut array = LedArray::new(1);
        assert!(!array.set(16, true));
        assert!(!array.is_on(16));
    }

    #[test]
    fn test_pass_counter_binary() {
        let mut array = LedArray::new(2);

        array.advance_passes();
        // passes = 1 → chip 1 (LSB) lit
        assert!(!array.is_on(7));
        assert!(array.is_on(23));

        array.advance_passes();
        // passes = 2 → chip 0 (MSB) lit
        assert!(array.is_on(7));
        assert!(!array.is_on(23));

        array.advance_passes();
        array.advance_passes();
        assert_eq!(array.passes(), 0);
        assert!(!array.is_on(7) && !array.is_on(23));
    }
}
