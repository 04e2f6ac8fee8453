use crate::types::Triplet;

/// Default rate-to-angle factor, which assumes roughly 0.1 s between samples
pub const DEFAULT_SCALE_FACTOR: f32 = 1.1;

/// Pseudo-angle from a filtered angular rate.
///
/// This is a fixed-factor approximation of the orientation change over one
/// sample interval, not a time integral. Keep the factor configurable so
/// it can be tuned without touching the posture logic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleEstimator {
    scale_factor: f32,
}

/// Per-axis angle estimate in degrees
pub type AngleSample = Triplet;

impl AngleEstimator {
    pub fn new(scale_factor: f32) -> Self {
        Self { scale_factor }
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    pub fn estimate(&self, filtered_rate: f32) -> f32 {
        filtered_rate * self.scale_factor
    }

    /// Angle sample for all three axes, rounded to one decimal place
    pub fn estimate_triplet(&self, filtered_rate: Triplet) -> AngleSample {
        filtered_rate.map(|r| self.estimate(r)).round_tenth()
    }
}

impl Default for AngleEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_SCALE_FACTOR)
    }
}
