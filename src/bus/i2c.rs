#[cfg(target_os = "linux")]
use i2cdev::core::I2CDevice;
#[cfg(target_os = "linux")]
use i2cdev::linux::LinuxI2CDevice;

use super::BusTransport;
use crate::errors::{TransportError, TransportResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Run a blocking device call on the blocking pool.
///
/// The caller's future only waits on the join handle, so an outer
/// `tokio::time::timeout` can give up on a hung call. The call itself keeps
/// the device locked until it returns.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) async fn offload<D, T, F>(device: &Arc<Mutex<D>>, op: F) -> TransportResult<T>
where
    D: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut D) -> TransportResult<T> + Send + 'static,
{
    let device = Arc::clone(device);
    tokio::task::spawn_blocking(move || {
        let mut guard = device
            .lock()
            .map_err(|_| TransportError::Io("bus device lock poisoned".to_string()))?;
        op(&mut *guard)
    })
    .await
    .map_err(|e| TransportError::Io(format!("bus task failed: {}", e)))?
}

/// I2C bus implementation
#[cfg(target_os = "linux")]
pub struct I2CBus {
    device: Arc<Mutex<LinuxI2CDevice>>,
    path: String,
}

#[cfg(not(target_os = "linux"))]
pub struct I2CBus {
    path: String,
}

#[cfg(target_os = "linux")]
impl I2CBus {
    pub fn new(path: &str) -> TransportResult<Self> {
        let device = LinuxI2CDevice::new(path, 0)?;
        Ok(Self {
            device: Arc::new(Mutex::new(device)),
            path: path.to_string(),
        })
    }
}

#[cfg(target_os = "linux")]
#[async_trait]
impl BusTransport for I2CBus {
    async fn write_byte(&mut self, address: u8, reg: u8, byte: u8) -> TransportResult<()> {
        offload(&self.device, move |dev| {
            dev.set_slave_address(address as u16)?;
            dev.smbus_write_byte_data(reg, byte)?;
            Ok(())
        })
        .await
    }

    async fn send_byte(&mut self, address: u8, byte: u8) -> TransportResult<()> {
        offload(&self.device, move |dev| {
            dev.set_slave_address(address as u16)?;
            dev.smbus_write_byte(byte)?;
            Ok(())
        })
        .await
    }

    async fn read_bytes(&mut self, address: u8, reg: u8, len: usize) -> TransportResult<Vec<u8>> {
        // Block reads may come back short; the caller checks the length
        let block_len = u8::try_from(len).map_err(|_| {
            TransportError::Io(format!("block read of {} bytes exceeds SMBus limit", len))
        })?;

        offload(&self.device, move |dev| {
            dev.set_slave_address(address as u16)?;
            if block_len == 1 {
                Ok(vec![dev.smbus_read_byte_data(reg)?])
            } else {
                Ok(dev.smbus_read_i2c_block_data(reg, block_len)?)
            }
        })
        .await
    }
}

#[cfg(not(target_os = "linux"))]
impl I2CBus {
    pub fn new(path: &str) -> TransportResult<Self> {
        Err(TransportError::Unsupported(format!(
            "I2C is only supported on Linux (requested '{}')",
            path
        )))
    }
}

#[cfg(not(target_os = "linux"))]
#[async_trait]
impl BusTransport for I2CBus {
    async fn write_byte(&mut self, _address: u8, _reg: u8, _byte: u8) -> TransportResult<()> {
        Err(TransportError::Unsupported(self.path.clone()))
    }

    async fn send_byte(&mut self, _address: u8, _byte: u8) -> TransportResult<()> {
        Err(TransportError::Unsupported(self.path.clone()))
    }

    async fn read_bytes(&mut self, _address: u8, _reg: u8, _len: usize) -> TransportResult<Vec<u8>> {
        Err(TransportError::Unsupported(self.path.clone()))
    }
}

impl I2CBus {
    /// Device node path, for logging
    pub fn path(&self) -> &str {
        &self.path
    }
}
