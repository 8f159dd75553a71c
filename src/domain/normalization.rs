// ============================================================
// Layer 3 — Pixel Normalisation
// ============================================================
// MNIST pixels arrive as bytes in [0, 255]. The network is
// trained on standardised values:
//
//   x = (p / 255 - mean) / std
//
// The same constants are written next to the evaluation
// archive so a consumer can reproduce the transform.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: f32,
    pub std:  f32,
}

impl Normalization {
    /// Dataset-wide mean and standard deviation of MNIST training pixels.
    pub const MNIST: Normalization = Normalization { mean: 0.1307, std: 0.3081 };

    pub fn new(mean: f32, std: f32) -> Self {
        Self { mean, std }
    }

    /// Finite constants with a strictly positive std; anything else
    /// would turn every pixel into inf or NaN.
    pub fn is_valid(&self) -> bool {
        self.mean.is_finite() && self.std.is_finite() && self.std > 0.0
    }

    /// Normalise a single raw pixel byte.
    pub fn apply(&self, pixel: u8) -> f32 {
        (pixel as f32 / 255.0 - self.mean) / self.std
    }

    /// Normalise a pixel already expressed as a float in [0, 255].
    pub fn apply_f32(&self, pixel: f32) -> f32 {
        (pixel / 255.0 - self.mean) / self.std
    }
}

impl Default for Normalization {
    fn default() -> Self {
        Self::MNIST
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_pixel_maps_below_zero() {
        let n = Normalization::MNIST;
        let v = n.apply(0);
        assert!((v - (-0.1307 / 0.3081)).abs() < 1e-6);
    }

    #[test]
    fn white_pixel_maps_to_expected_value() {
        let n = Normalization::MNIST;
        let v = n.apply(255);
        assert!((v - ((1.0 - 0.1307) / 0.3081)).abs() < 1e-5);
    }

    #[test]
    fn byte_and_float_paths_agree() {
        let n = Normalization::MNIST;
        assert_eq!(n.apply(200), n.apply_f32(200.0));
    }

    #[test]
    fn degenerate_constants_are_invalid() {
        assert!(Normalization::MNIST.is_valid());
        assert!(!Normalization::new(0.1, 0.0).is_valid());
        assert!(!Normalization::new(0.1, -1.0).is_valid());
        assert!(!Normalization::new(f32::NAN, 0.3).is_valid());
        assert!(!Normalization::new(0.1, f32::INFINITY).is_valid());
    }
}
