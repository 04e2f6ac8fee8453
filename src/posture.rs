use crate::calibration::CalibrationState;
use crate::config::Thresholds;
use crate::registry::ArrayReading;
use crate::types::{Joint, Triplet};
use std::collections::BTreeMap;
use tracing::debug;

/// Outward-facing per-joint deltas, small moves zeroed. Always holds all
/// five joints; joints without data report zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaReport {
    pub deltas: BTreeMap<Joint, Triplet>,
}

impl DeltaReport {
    pub fn zeroed() -> Self {
        Self {
            deltas: Joint::ALL.iter().map(|&j| (j, Triplet::ZERO)).collect(),
        }
    }

    pub fn get(&self, joint: Joint) -> Triplet {
        self.deltas.get(&joint).copied().unwrap_or_default()
    }
}

/// Bad-posture flag per posture joint
#[derive(Debug, Clone, PartialEq)]
pub struct PostureFlags {
    pub flags: BTreeMap<Joint, bool>,
}

impl PostureFlags {
    pub fn cleared() -> Self {
        Self {
            flags: Joint::POSTURE.iter().map(|&j| (j, false)).collect(),
        }
    }

    pub fn is_flagged(&self, joint: Joint) -> bool {
        self.flags.get(&joint).copied().unwrap_or(false)
    }

    pub fn any(&self) -> bool {
        self.flags.values().any(|&f| f)
    }

    pub fn flagged(&self) -> impl Iterator<Item = Joint> + '_ {
        self.flags.iter().filter(|(_, f)| **f).map(|(j, _)| *j)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub report: DeltaReport,
    pub flags: PostureFlags,
    /// Joints with fresh data but no baseline yet
    pub uncalibrated: Vec<Joint>,
}

/// Applies the alert and reporting thresholds to per-joint deltas.
///
/// Both thresholds look at the same raw delta. The alert decision never
/// sees the zeroed report values.
#[derive(Debug, Clone, Copy)]
pub struct PostureEvaluator {
    thresholds: Thresholds,
}

impl PostureEvaluator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Any axis strictly above the alert threshold
    pub fn exceeds_alert(&self, delta: Triplet) -> bool {
        delta.axes().iter().any(|d| d.abs() > self.thresholds.alert_deg)
    }

    /// Zero every axis smaller than the reporting threshold
    pub fn suppress(&self, delta: Triplet) -> Triplet {
        let limit = self.thresholds.reporting_deg;
        delta.map(|d| if d.abs() >= limit { d } else { 0.0 })
    }

    pub fn evaluate(&self, reading: &ArrayReading, calibration: &CalibrationState) -> Evaluation {
        let mut report = DeltaReport::zeroed();
        let mut flags = PostureFlags::cleared();
        let mut uncalibrated = Vec::new();

        for (joint, r) in &reading.readings {
            let Some(sample) = r.sample() else {
                continue;
            };
            let Some(delta) = calibration.delta(*joint, sample) else {
                uncalibrated.push(*joint);
                continue;
            };

            report.deltas.insert(*joint, self.suppress(delta));
            if joint.is_posture_relevant() && self.exceeds_alert(delta) {
                debug!("[posture] {} off baseline by {:?}", joint, delta);
                flags.flags.insert(*joint, true);
            }
        }

        Evaluation {
            report,
            flags,
            uncalibrated,
        }
    }
}

impl Default for PostureEvaluator {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}
