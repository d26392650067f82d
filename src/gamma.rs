/// Exponent of the power-law brightness curve
pub const GAMMA: f64 = 2.5;

/// Gamma correction lookup table producing LPD8806 data bytes.
///
/// Every entry has the top bit set (the chip's data framing bit) and carries
/// 7-bit brightness in the low bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GammaTable {
    table: [u8; 256],
}

impl GammaTable {
    pub fn new() -> Self {
        let mut table = [0u8; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let level = (i as f64 / 255.0).powf(GAMMA) * 127.0;
            *entry = 0x80 | level.round() as u8;
        }
        GammaTable { table }
    }

    pub fn get(&self, index: u8) -> u8 {
        self.table[usize::from(index)]
    }

    /// Look up a normalized intensity, clamping it into `[0.0, 1.0]` first
    pub fn correct(&self, intensity: f32) -> u8 {
        self.get(scale_intensity(intensity))
    }

    pub fn as_bytes(&self) -> &[u8; 256] {
        &self.table
    }
}

impl Default for GammaTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale `[0.0, 1.0]` to `0..=255`. Out-of-range values saturate; NaN maps to 0.
pub fn scale_intensity(intensity: f32) -> u8 {
    if intensity.is_nan() {
        return 0;
    }
    (intensity.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let gamma = GammaTable::new();
        assert_eq!(gamma.get(0), 0x80);
        assert_eq!(gamma.get(255), 0xff);
    }

    #[test]
    fn test_framing_bit_and_monotonic() {
        let gamma = GammaTable::new();
        let bytes = gamma.as_bytes();
        assert!(bytes.iter().all(|b| b & 0x80 == 0x80));
        assert!(bytes.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_curve_values() {
        let gamma = GammaTable::new();
        // 127 * (128/255)^2.5 = 22.67
        assert_eq!(gamma.get(128), 0x80 | 23);
        // 127 * (64/255)^2.5 = 4.00
        assert_eq!(gamma.get(64), 0x80 | 4);
        assert_eq!(gamma.get(1), 0x80);
    }

    #[test]
    fn test_scale_intensity_clamps() {
        assert_eq!(scale_intensity(0.0), 0);
        assert_eq!(scale_intensity(1.0), 255);
        assert_eq!(scale_intensity(0.5), 128);
        assert_eq!(scale_intensity(1.7), 255);
        assert_eq!(scale_intensity(-0.2), 0);
        assert_eq!(scale_intensity(f32::NAN), 0);
    }

    #[test]
    fn test_correct_out_of_range() {
        let gamma = GammaTable::new();
        assert_eq!(gamma.correct(2.0), gamma.get(255));
        assert_eq!(gamma.correct(-1.0), gamma.get(0));
    }
}
