//! Progress bar rendering

use alloc::vec::Vec;

use spacedeck_protocol::Rgb;

/// Red through green, one shade per bar segment
const PALETTE: [Rgb; 15] = [
    Rgb::new(255, 0, 0),
    Rgb::new(242, 5, 0),
    Rgb::new(230, 13, 0),
    Rgb::new(204, 20, 0),
    Rgb::new(191, 26, 0),
    Rgb::new(179, 38, 0),
    Rgb::new(153, 51, 0),
    Rgb::new(128, 102, 0),
    Rgb::new(102, 115, 0),
    Rgb::new(77, 128, 0),
    Rgb::new(51, 140, 0),
    Rgb::new(38, 153, 0),
    Rgb::new(26, 179, 0),
    Rgb::new(13, 204, 0),
    Rgb::new(0, 230, 0),
];

/// Normalize a progress value to `0.0..=1.0`
///
/// Values up to 1 are already fractions; anything larger is a percentage.
pub fn progress_fraction(value: f32) -> f32 {
    let fraction = if value <= 1.0 { value } else { value / 100.0 };
    if fraction.is_nan() {
        return 0.0;
    }
    fraction.clamp(0.0, 1.0)
}

/// Colors for an `led_count` bar showing `value`
///
/// The lit segments share one color picked from the palette by how full
/// the bar is. The strip is mounted upside down, so the result is
/// reversed: the last LED is the first lit one.
pub fn progress_colors(value: f32, led_count: usize) -> Vec<Rgb> {
    if led_count == 0 {
        return Vec::new();
    }

    let fraction = progress_fraction(value);
    let shade = ((fraction * PALETTE.len() as f32) as usize).min(PALETTE.len() - 1);
    let lit = ((fraction * led_count as f32) as usize + 1).min(led_count);

    let mut colors = Vec::with_capacity(led_count);
    colors.extend((0..led_count).map(|i| if i < lit { PALETTE[shade] } else { Rgb::BLACK }));
    colors.reverse();
    colors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_and_percent() {
        assert_eq!(progress_fraction(0.5), 0.5);
        assert_eq!(progress_fraction(50.0), 0.5);
        assert_eq!(progress_fraction(250.0), 1.0);
        assert_eq!(progress_fraction(-3.0), 0.0);
        assert_eq!(progress_fraction(f32::NAN), 0.0);
    }

    #[test]
    fn test_empty_bar_lights_one() {
        let colors = progress_colors(0.0, 15);
        assert_eq!(colors.len(), 15);
        assert_eq!(colors[14], PALETTE[0]);
        assert!(colors[..14].iter().all(|&c| c == Rgb::BLACK));
    }

    #[test]
    fn test_full_bar_is_green() {
        let colors = progress_colors(100.0, 15);
        assert!(colors.iter().all(|&c| c == PALETTE[14]));
    }

    #[test]
    fn test_half_bar_reversed() {
        let colors = progress_colors(50.0, 10);
        let lit: std::vec::Vec<_> = colors.iter().filter(|&&c| c != Rgb::BLACK).collect();
        assert_eq!(lit.len(), 6);
        assert_eq!(colors[0], Rgb::BLACK);
        assert_eq!(colors[9], PALETTE[7]);
    }
}
