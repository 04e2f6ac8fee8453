use thiserror::Error;

/// Failure of a single transaction on the shared bus
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("bus I/O failed: {0}")]
    Io(String),

    #[error("bus transaction timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("bus not supported on this platform: {0}")]
    Unsupported(String),
}

#[cfg(target_os = "linux")]
impl From<i2cdev::linux::LinuxI2CError> for TransportError {
    fn from(error: i2cdev::linux::LinuxI2CError) -> Self {
        TransportError::Io(error.to_string())
    }
}

/// Errors raised while talking to the multiplexer or a sensor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("multiplexer channel {channel} out of range (0..=7)")]
    ChannelRange { channel: i32 },

    #[error("channel select {channel} failed: {source}")]
    ChannelSelect {
        channel: u8,
        #[source]
        source: TransportError,
    },

    #[error("Sensor '{sensor}' bus transaction failed: {source}")]
    Transport {
        sensor: String,
        #[source]
        source: TransportError,
    },

    #[error("Sensor '{sensor}' incomplete data from register {register:#04x}: {received} of 6 bytes")]
    IncompleteData { sensor: String, register: u8, received: usize },

    #[error("Sensor '{sensor}' initialization failed: {reason}")]
    InitError { sensor: String, reason: String },

    #[error("Sensor '{sensor}' wrong chip ID: expected {expected:#04x}, got {actual:#04x}")]
    IdentityMismatch { sensor: String, expected: u8, actual: u8 },

    #[error("Unsupported sensor driver: '{driver}'")]
    UnsupportedDriver { driver: String },
}

/// Baseline capture errors; the previous baseline is kept when one is raised
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("baseline capture for '{joint}' skipped: {reason}")]
    CaptureFailed { joint: String, reason: String },
}

/// Haptic actuator errors
#[derive(Error, Debug)]
pub enum ActuatorError {
    #[error("PWM output '{path}' write failed: {source}")]
    Pwm {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("intensity {0} outside 0.0..=1.0")]
    InvalidIntensity(f32),

    #[error("feedback task is no longer running")]
    TaskClosed,
}

/// Errors surfaced by a reporting collaborator
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("report transport failed: {0}")]
    Transport(String),

    #[error("report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from '{path}': {source}")]
    LoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration format: {0}")]
    FormatError(#[from] toml::de::Error),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Registry and initialization errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Bus initialization failed: {0}")]
    BusInitError(#[source] TransportError),

    #[error("Failed to create sensor driver: {0}")]
    DriverCreationError(#[source] SensorError),

    #[error("No sensor passed initialization")]
    NoSensors,
}

/// Result type aliases for convenience
pub type TransportResult<T> = Result<T, TransportError>;
pub type SensorResult<T> = Result<T, SensorError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type ActuatorResult<T> = Result<T, ActuatorError>;
pub type ReportResult<T> = Result<T, ReportError>;
pub type RegistryResult<T> = Result<T, RegistryError>;
