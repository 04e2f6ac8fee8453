pub mod i2c;
pub mod multiplexer;

#[cfg(test)]
pub mod mock;

use crate::errors::{TransportError, TransportResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub use multiplexer::{Channel, Multiplexer};

/// Register-level access to the shared bus.
///
/// Implementations perform exactly one transaction per call. Reads may
/// return fewer bytes than requested; callers decide what a short read means.
#[async_trait]
pub trait BusTransport: Send {
    /// Write `byte` to register `reg` of the device at `address`
    async fn write_byte(&mut self, address: u8, reg: u8, byte: u8) -> TransportResult<()>;

    /// Write a single byte with no register prefix (used by the multiplexer)
    async fn send_byte(&mut self, address: u8, byte: u8) -> TransportResult<()>;

    /// Read up to `len` bytes starting at register `reg`
    async fn read_bytes(&mut self, address: u8, reg: u8, len: usize) -> TransportResult<Vec<u8>>;
}

/// Transport wrapper that bounds every transaction by a timeout so a hung
/// device cannot stall the polling loop.
pub struct BoundedBus {
    inner: Box<dyn BusTransport>,
    timeout: Duration,
}

impl BoundedBus {
    pub fn new(inner: Box<dyn BusTransport>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    fn elapsed(&self) -> TransportError {
        TransportError::Timeout {
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

#[async_trait]
impl BusTransport for BoundedBus {
    async fn write_byte(&mut self, address: u8, reg: u8, byte: u8) -> TransportResult<()> {
        let outcome = tokio::time::timeout(self.timeout, self.inner.write_byte(address, reg, byte)).await;
        outcome.unwrap_or_else(|_| Err(self.elapsed()))
    }

    async fn send_byte(&mut self, address: u8, byte: u8) -> TransportResult<()> {
        let outcome = tokio::time::timeout(self.timeout, self.inner.send_byte(address, byte)).await;
        outcome.unwrap_or_else(|_| Err(self.elapsed()))
    }

    async fn read_bytes(&mut self, address: u8, reg: u8, len: usize) -> TransportResult<Vec<u8>> {
        let outcome = tokio::time::timeout(self.timeout, self.inner.read_bytes(address, reg, len)).await;
        outcome.unwrap_or_else(|_| Err(self.elapsed()))
    }
}

/// The bus together with the multiplexer that decides which sensor sits on it.
///
/// The multiplexer selection is shared state, so the pair is only ever used
/// through a single [`SharedBus`] lock: a select and the reads that follow
/// it happen under the same guard.
pub struct MuxedBus {
    transport: BoundedBus,
    mux: Multiplexer,
}

impl MuxedBus {
    pub fn new(transport: BoundedBus, mux: Multiplexer) -> Self {
        Self { transport, mux }
    }

    /// Route the bus to `channel`
    pub async fn select(&mut self, channel: i32) -> crate::errors::SensorResult<Channel> {
        self.mux.select(&mut self.transport, channel).await
    }

    /// Disconnect every channel
    pub async fn disable(&mut self) -> TransportResult<()> {
        self.mux.disable(&mut self.transport).await
    }

    pub fn transport(&mut self) -> &mut dyn BusTransport {
        &mut self.transport
    }
}

pub type SharedBus = Arc<Mutex<MuxedBus>>;

pub fn shared(bus: MuxedBus) -> SharedBus {
    Arc::new(Mutex::new(bus))
}
