use crate::angle::DEFAULT_SCALE_FACTOR;
use crate::bus::multiplexer::{DEFAULT_MUX_ADDRESS, MAX_CHANNEL};
use crate::errors::{ConfigError, ConfigResult};
use crate::filter::DEFAULT_WINDOW;
use crate::types::Joint;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::time::Duration;

/// Root configuration, loaded from `posture.toml`.
///
/// Every field has a default matching `config/posture.toml`, so an empty
/// file is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub bus: BusSettings,
    pub sampling: SamplingSettings,
    pub thresholds: Thresholds,
    pub feedback: FeedbackSettings,
    #[serde(rename = "joint")]
    pub joints: Vec<JointEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// I2C device node
    pub path: String,
    pub mux_address: u8,
    /// Upper bound for one bus transaction
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    /// Wait after a channel switch before reading. There is no ready signal,
    /// so this must cover the mux and sensor settle time.
    pub settle_delay_ms: u64,
    pub filter_window: usize,
    pub angle_scale_factor: f32,
    /// Pause between polling cycles; the scale factor assumes this interval
    pub interval_ms: u64,
}

/// Deltas between the two thresholds are reported but do not raise an alert.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Deltas below this magnitude (degrees) are reported as zero
    pub reporting_deg: f32,
    /// Deltas above this magnitude (degrees) flag bad posture
    pub alert_deg: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedbackSettings {
    pub pwm_chip: u32,
    pub pwm_channel: u32,
    pub frequency_hz: u32,
    pub duration_ms: u64,
    /// Normalized duty cycle, 0.0..=1.0
    pub intensity: f32,
    /// Pending pulses the feedback task will hold before dropping new ones
    pub queue_depth: usize,
}

/// One `[[joint]]` section
#[derive(Debug, Clone, Deserialize)]
pub struct JointEntry {
    pub name: Joint,
    pub channel: u8,
    #[serde(default = "default_sensor_address")]
    pub address: u8,
    #[serde(default = "default_driver")]
    pub driver: String,
}

fn default_sensor_address() -> u8 {
    0x68
}

fn default_driver() -> String {
    "mpu6050".to_string()
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            path: "/dev/i2c-1".to_string(),
            mux_address: DEFAULT_MUX_ADDRESS,
            timeout_ms: 50,
        }
    }
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 100,
            filter_window: DEFAULT_WINDOW,
            angle_scale_factor: DEFAULT_SCALE_FACTOR,
            interval_ms: 100,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            reporting_deg: 3.0,
            alert_deg: 7.5,
        }
    }
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            pwm_chip: 0,
            pwm_channel: 0,
            frequency_hz: 500,
            duration_ms: 1000,
            intensity: 0.5,
            queue_depth: 1,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bus: BusSettings::default(),
            sampling: SamplingSettings::default(),
            thresholds: Thresholds::default(),
            feedback: FeedbackSettings::default(),
            joints: Joint::ALL
                .iter()
                .map(|&name| JointEntry {
                    name,
                    channel: name.default_channel(),
                    address: default_sensor_address(),
                    driver: default_driver(),
                })
                .collect(),
        }
    }
}

impl SamplingSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl BusSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl FeedbackSettings {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

impl HubConfig {
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let parsed: HubConfig = toml::from_str(content)?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.joints.is_empty() {
            return Err(invalid("joint", "at least one joint must be configured"));
        }

        let mut names = HashSet::new();
        let mut channels = HashSet::new();
        for j in &self.joints {
            if j.channel > MAX_CHANNEL {
                return Err(invalid(
                    &format!("joint.{}.channel", j.name),
                    format!("{} is outside 0..={}", j.channel, MAX_CHANNEL),
                ));
            }
            if !names.insert(j.name) {
                return Err(invalid("joint.name", format!("'{}' configured twice", j.name)));
            }
            if !channels.insert(j.channel) {
                return Err(invalid(
                    "joint.channel",
                    format!("channel {} shared by more than one joint", j.channel),
                ));
            }
        }

        if self.sampling.filter_window == 0 {
            return Err(invalid("sampling.filter_window", "must be at least 1"));
        }
        if !self.sampling.angle_scale_factor.is_finite() {
            return Err(invalid("sampling.angle_scale_factor", "must be finite"));
        }
        for (field, value) in [
            ("thresholds.reporting_deg", self.thresholds.reporting_deg),
            ("thresholds.alert_deg", self.thresholds.alert_deg),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(field, format!("{} must be a positive angle", value)));
            }
        }
        if !(0.0..=1.0).contains(&self.feedback.intensity) {
            return Err(invalid("feedback.intensity", "must be within 0.0..=1.0"));
        }
        if self.feedback.frequency_hz == 0 {
            return Err(invalid("feedback.frequency_hz", "must be non-zero"));
        }
        if self.feedback.queue_depth == 0 {
            return Err(invalid("feedback.queue_depth", "must be at least 1"));
        }
        Ok(())
    }
}

/// Loads config from TOML file
pub fn load_hub_config(path: &str) -> ConfigResult<HubConfig> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::LoadError {
        path: path.to_string(),
        source,
    })?;
    HubConfig::from_toml(&content)
}
