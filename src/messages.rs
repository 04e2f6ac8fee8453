use crate::calibration::Baseline;
use crate::posture::{DeltaReport, PostureFlags};
use crate::types::{Joint, Triplet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-cycle report: joint name -> suppressed `{x, y, z}` delta.
/// The timestamp keys the submission and is not part of the JSON body.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReportMessage {
    #[serde(skip)]
    pub timestamp: String,
    #[serde(flatten)]
    pub joints: BTreeMap<Joint, Triplet>,
}

impl ReportMessage {
    pub fn new(timestamp: String, report: &DeltaReport) -> Self {
        Self {
            timestamp,
            joints: report.deltas.clone(),
        }
    }
}

/// Baselines in effect before a recalibration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct CalibrationMessage {
    pub baselines: BTreeMap<Joint, Baseline>,
}

/// Bad-posture status, 1 for a flagged joint and 0 otherwise
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct PostureStatusMessage {
    pub status: BTreeMap<Joint, u8>,
}

impl From<&PostureFlags> for PostureStatusMessage {
    fn from(flags: &PostureFlags) -> Self {
        Self {
            status: flags.flags.iter().map(|(&j, &f)| (j, f as u8)).collect(),
        }
    }
}

impl PostureStatusMessage {
    pub fn any_flagged(&self) -> bool {
        self.status.values().any(|&v| v != 0)
    }
}

/// Serialize any payload for logging or transport
pub fn to_json<T: Serialize>(payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_payload_shape() {
        let mut report = DeltaReport::zeroed();
        report.deltas.insert(Joint::MiddleBack, Triplet::new(8.0, 0.0, -3.5));
        let msg = ReportMessage::new("2024-05-01/12:00:00".to_string(), &report);

        let json = to_json(&msg).unwrap();
        assert!(!json.contains("2024-05-01"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 5);
        assert_eq!(value["middle_back"]["x"], 8.0);
        assert_eq!(value["middle_back"]["z"], -3.5);
        assert_eq!(value["left_elbow"]["y"], 0.0);
    }

    #[test]
    fn test_posture_status_from_flags() {
        let mut flags = PostureFlags::cleared();
        flags.flags.insert(Joint::LeftShoulder, true);
        let msg = PostureStatusMessage::from(&flags);

        assert!(msg.any_flagged());
        let json = to_json(&msg).unwrap();
        assert_eq!(json, r#"{"right_shoulder":0,"middle_back":0,"left_shoulder":1}"#);
    }

    #[test]
    fn test_cleared_status_is_all_zero() {
        let msg = PostureStatusMessage::from(&PostureFlags::cleared());
        assert!(!msg.any_flagged());
        assert_eq!(msg.status.len(), 3);
    }

    #[test]
    fn test_calibration_message_round_trip() {
        let mut baselines = BTreeMap::new();
        baselines.insert(Joint::RightShoulder, Triplet::new(1.5, -0.5, 0.0));
        let msg = CalibrationMessage { baselines };

        let json = to_json(&msg).unwrap();
        assert_eq!(json, r#"{"right_shoulder":{"x":1.5,"y":-0.5,"z":0.0}}"#);
        let decoded: CalibrationMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, msg);
    }
}
