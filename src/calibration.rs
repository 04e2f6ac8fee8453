//! Per-joint zero points for delta computation.

use crate::angle::AngleSample;
use crate::errors::CalibrationError;
use crate::registry::{ArrayReading, JointReading};
use crate::types::{Joint, Triplet};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Calibrated reference angle of one joint, one-decimal precision
pub type Baseline = Triplet;

/// Baselines keyed by joint.
///
/// A baseline is only ever replaced as a whole value, so any reader sees
/// either the old or the new `{x, y, z}`. A joint that never had fresh data
/// at capture time has no baseline at all, which is distinct from a genuine
/// zero baseline.
#[derive(Debug, Clone, Default)]
pub struct CalibrationState {
    baselines: BTreeMap<Joint, Baseline>,
}

impl CalibrationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the baseline of every joint that has a fresh sample.
    ///
    /// Joints without fresh data keep their previous baseline (or stay
    /// uncalibrated) and are returned as errors. Joints excluded at startup
    /// were already reported then and are skipped.
    pub fn capture_baseline(&mut self, reading: &ArrayReading) -> Vec<CalibrationError> {
        let mut errors = Vec::new();
        for (joint, r) in &reading.readings {
            match r {
                JointReading::Fresh(sample) => self.set(*joint, *sample),
                JointReading::Stale(e) => errors.push(CalibrationError::CaptureFailed {
                    joint: joint.to_string(),
                    reason: e.to_string(),
                }),
                JointReading::Excluded => debug!("[calibration] {} excluded, not captured", joint),
            }
        }

        for e in &errors {
            warn!("[calibration] {}", e);
        }
        info!("[calibration] {} baseline(s) captured", self.baselines.len());
        errors
    }

    /// Capture baselines only for joints that have none yet.
    /// Returns the joints calibrated by this call.
    pub fn capture_missing(&mut self, reading: &ArrayReading) -> Vec<Joint> {
        let mut captured = Vec::new();
        for (joint, r) in &reading.readings {
            if self.baselines.contains_key(joint) {
                continue;
            }
            if let JointReading::Fresh(sample) = r {
                self.set(*joint, *sample);
                captured.push(*joint);
            }
        }
        if !captured.is_empty() {
            info!("[calibration] late baseline for {:?}", captured);
        }
        captured
    }

    fn set(&mut self, joint: Joint, sample: AngleSample) {
        self.baselines.insert(joint, sample.round_tenth());
    }

    pub fn baseline(&self, joint: Joint) -> Option<Baseline> {
        self.baselines.get(&joint).copied()
    }

    pub fn is_calibrated(&self, joint: Joint) -> bool {
        self.baselines.contains_key(&joint)
    }

    /// Signed per-axis difference from the baseline, rounded to one decimal
    /// like its operands; `None` when uncalibrated
    pub fn delta(&self, joint: Joint, current: AngleSample) -> Option<Triplet> {
        self.baseline(joint).map(|b| (current - b).round_tenth())
    }

    pub fn snapshot(&self) -> BTreeMap<Joint, Baseline> {
        self.baselines.clone()
    }
}
