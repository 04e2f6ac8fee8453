use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-axis value in physical units (m/s², °/s or degrees)
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triplet {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Triplet {
    pub const ZERO: Triplet = Triplet { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            x: f(self.x),
            y: f(self.y),
            z: f(self.z),
        }
    }

    pub fn axes(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Round every axis to one decimal place
    pub fn round_tenth(self) -> Self {
        self.map(round_tenth)
    }
}

impl std::ops::Sub for Triplet {
    type Output = Triplet;

    fn sub(self, rhs: Triplet) -> Triplet {
        Triplet {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

pub fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Monitored body location; each one maps to a single sensor channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    RightElbow,
    LeftElbow,
    RightShoulder,
    MiddleBack,
    LeftShoulder,
}

impl Joint {
    pub const ALL: [Joint; 5] = [
        Joint::RightElbow,
        Joint::LeftElbow,
        Joint::RightShoulder,
        Joint::MiddleBack,
        Joint::LeftShoulder,
    ];

    /// Joints whose deviation counts as bad posture. Elbows are only reported.
    pub const POSTURE: [Joint; 3] = [Joint::RightShoulder, Joint::MiddleBack, Joint::LeftShoulder];

    pub fn name(self) -> &'static str {
        match self {
            Joint::RightElbow => "right_elbow",
            Joint::LeftElbow => "left_elbow",
            Joint::RightShoulder => "right_shoulder",
            Joint::MiddleBack => "middle_back",
            Joint::LeftShoulder => "left_shoulder",
        }
    }

    pub fn is_posture_relevant(self) -> bool {
        Self::POSTURE.contains(&self)
    }

    /// Channel the joint's sensor is wired to on the reference harness
    pub fn default_channel(self) -> u8 {
        match self {
            Joint::RightElbow => 0,
            Joint::LeftElbow => 1,
            Joint::RightShoulder => 2,
            Joint::MiddleBack => 3,
            Joint::LeftShoulder => 4,
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
