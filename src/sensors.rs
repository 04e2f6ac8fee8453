use crate::bus::BusTransport;
use crate::errors::{SensorError, SensorResult};
use crate::types::Triplet;
use async_trait::async_trait;

#[cfg(feature = "mpu6050")]
pub mod mpu6050;

/// One fresh sample: m/s² for acceleration, °/s for angular rate
pub type SensorReading = Triplet;

/// Inertial sensor sitting behind one multiplexer channel.
///
/// Drivers hold no sample state; filtering happens in the sensor array.
/// The caller must have selected the sensor's channel before any call.
#[async_trait]
pub trait SensorDriver: Send + Sync {
    /// Wake the device and verify its identity
    async fn init(&mut self, bus: &mut dyn BusTransport) -> SensorResult<()>;
    async fn read_gyroscope(&self, bus: &mut dyn BusTransport) -> SensorResult<SensorReading>;
    async fn read_acceleration(&self, bus: &mut dyn BusTransport) -> SensorResult<SensorReading>;
    fn id(&self) -> &str;
    fn address(&self) -> u8;
}

pub fn create_sensor_driver(
    driver: &str,
    id: String,
    address: u8,
) -> SensorResult<Box<dyn SensorDriver + Send>> {
    match driver {
        #[cfg(feature = "mpu6050")]
        "mpu6050" => Ok(Box::new(mpu6050::Mpu6050::new(id, address))),
        _ => Err(SensorError::UnsupportedDriver { driver: driver.to_string() }),
    }
}
