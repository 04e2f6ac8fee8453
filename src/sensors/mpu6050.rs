use super::{SensorDriver, SensorReading};
use crate::bus::BusTransport;
use crate::errors::{SensorError, SensorResult};
use async_trait::async_trait;
use tracing::{debug, warn};

// Register addresses for the MPU6050
const PWR_MGMT_1: u8 = 0x6B;
const ACCEL_XOUT_H: u8 = 0x3B;
const GYRO_XOUT_H: u8 = 0x43;
const WHO_AM_I: u8 = 0x75;

pub const WHO_AM_I_EXPECTED: u8 = 0x68;
pub const DEFAULT_ADDRESS: u8 = 0x68;

// Sensitivity values at the power-on full-scale ranges
const ACCEL_SENSITIVITY_2G: f32 = 16384.0; // LSB/g
const GYRO_SENSITIVITY_250DPS: f32 = 131.0; // LSB/dps
pub const EARTH_GRAVITY: f32 = 9.80665;

pub struct Mpu6050 {
    id: String,
    address: u8,
}

impl Mpu6050 {
    pub fn new(id: String, address: u8) -> Self {
        Self { id, address }
    }

    /// Clear the sleep bit so the device starts sampling
    pub async fn wake(&self, bus: &mut dyn BusTransport) -> SensorResult<()> {
        bus.write_byte(self.address, PWR_MGMT_1, 0x00)
            .await
            .map_err(|e| SensorError::InitError {
                sensor: self.id.clone(),
                reason: format!("Failed to wake device: {}", e),
            })
    }

    pub async fn identify(&self, bus: &mut dyn BusTransport) -> SensorResult<()> {
        let data = bus
            .read_bytes(self.address, WHO_AM_I, 1)
            .await
            .map_err(|source| SensorError::Transport {
                sensor: self.id.clone(),
                source,
            })?;

        match data.first() {
            Some(&WHO_AM_I_EXPECTED) => Ok(()),
            other => Err(SensorError::IdentityMismatch {
                sensor: self.id.clone(),
                expected: WHO_AM_I_EXPECTED,
                actual: other.copied().unwrap_or(0),
            }),
        }
    }

    /// Read three big-endian i16 words starting at `reg` and scale them.
    ///
    /// A short read is not an error here: it is logged and yields a zero
    /// triplet marked incomplete.
    pub async fn read_triplet(
        &self,
        bus: &mut dyn BusTransport,
        reg: u8,
        sensitivity: f32,
    ) -> SensorResult<TripletRead> {
        let buf = bus
            .read_bytes(self.address, reg, 6)
            .await
            .map_err(|source| SensorError::Transport {
                sensor: self.id.clone(),
                source,
            })?;

        if buf.len() < 6 {
            warn!(
                "[{}] incomplete data from register {:#04x}: got {} of 6 bytes",
                self.id,
                reg,
                buf.len()
            );
            return Ok(TripletRead {
                value: SensorReading::ZERO,
                received: buf.len(),
            });
        }

        let raw = [
            i16::from_be_bytes([buf[0], buf[1]]),
            i16::from_be_bytes([buf[2], buf[3]]),
            i16::from_be_bytes([buf[4], buf[5]]),
        ];

        Ok(TripletRead {
            value: SensorReading::new(
                raw[0] as f32 / sensitivity,
                raw[1] as f32 / sensitivity,
                raw[2] as f32 / sensitivity,
            ),
            received: buf.len(),
        })
    }

    /// The scaled value, or `IncompleteData` when the read came up short
    fn complete(&self, read: TripletRead, reg: u8) -> SensorResult<SensorReading> {
        if read.is_complete() {
            Ok(read.value)
        } else {
            Err(SensorError::IncompleteData {
                sensor: self.id.clone(),
                register: reg,
                received: read.received,
            })
        }
    }
}

/// Result of one 6-byte triplet read
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripletRead {
    /// Zero when the read was short
    pub value: SensorReading,
    pub received: usize,
}

impl TripletRead {
    pub fn is_complete(&self) -> bool {
        self.received >= 6
    }
}

#[async_trait]
impl SensorDriver for Mpu6050 {
    async fn init(&mut self, bus: &mut dyn BusTransport) -> SensorResult<()> {
        self.wake(bus).await?;
        self.identify(bus).await?;
        debug!("[{}] MPU6050 at {:#04x} identified", self.id, self.address);
        Ok(())
    }

    async fn read_gyroscope(&self, bus: &mut dyn BusTransport) -> SensorResult<SensorReading> {
        let read = self.read_triplet(bus, GYRO_XOUT_H, GYRO_SENSITIVITY_250DPS).await?;
        self.complete(read, GYRO_XOUT_H)
    }

    async fn read_acceleration(&self, bus: &mut dyn BusTransport) -> SensorResult<SensorReading> {
        let read = self.read_triplet(bus, ACCEL_XOUT_H, ACCEL_SENSITIVITY_2G).await?;
        let g = self.complete(read, ACCEL_XOUT_H)?;
        Ok(g.map(|v| v * EARTH_GRAVITY))
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn address(&self) -> u8 {
        self.address
    }
}
