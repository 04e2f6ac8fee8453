use super::BusTransport;
use crate::errors::{SensorError, SensorResult, TransportResult};
use std::fmt;
use tracing::{debug, warn};

/// Default I2C address of a TCA9548A-class multiplexer
pub const DEFAULT_MUX_ADDRESS: u8 = 0x70;

/// Highest multiplexer output
pub const MAX_CHANNEL: u8 = 7;

/// A validated multiplexer output, always within `0..=7`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(u8);

impl Channel {
    pub fn new(raw: i32) -> SensorResult<Self> {
        if (0..=MAX_CHANNEL as i32).contains(&raw) {
            Ok(Channel(raw as u8))
        } else {
            Err(SensorError::ChannelRange { channel: raw })
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Control byte that connects only this channel
    pub fn mask(self) -> u8 {
        1 << self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// 1-of-8 bus multiplexer
#[derive(Debug, Clone)]
pub struct Multiplexer {
    address: u8,
}

impl Multiplexer {
    pub fn new(address: u8) -> Self {
        Self { address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Connect `channel` to the bus.
    ///
    /// The channel is validated before anything is written, so an out of
    /// range request leaves the bus untouched. Write failures are returned
    /// to the caller without retrying.
    pub async fn select(&self, bus: &mut dyn BusTransport, channel: i32) -> SensorResult<Channel> {
        let channel = Channel::new(channel)?;
        bus.send_byte(self.address, channel.mask())
            .await
            .map_err(|source| {
                warn!("[mux] selecting {} failed: {}", channel, source);
                SensorError::ChannelSelect {
                    channel: channel.index(),
                    source,
                }
            })?;
        debug!("[mux] selected {}", channel);
        Ok(channel)
    }

    /// Disconnect every channel
    pub async fn disable(&self, bus: &mut dyn BusTransport) -> TransportResult<()> {
        bus.send_byte(self.address, 0x00).await
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new(DEFAULT_MUX_ADDRESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::{BusWrite, MockBus};

    #[tokio::test]
    async fn test_select_writes_channel_mask() {
        let mut bus = MockBus::new();
        let mux = Multiplexer::default();

        let channel = mux.select(&mut bus, 3).await.unwrap();
        assert_eq!(channel.index(), 3);
        assert_eq!(
            bus.writes(),
            vec![BusWrite::Command { address: 0x70, byte: 0b0000_1000 }]
        );
    }

    #[tokio::test]
    async fn test_select_rejects_out_of_range_without_bus_traffic() {
        let mut bus = MockBus::new();
        let mux = Multiplexer::default();

        for bad in [8, -1] {
            let err = mux.select(&mut bus, bad).await.unwrap_err();
            assert_eq!(err, SensorError::ChannelRange { channel: bad });
        }
        assert!(bus.writes().is_empty());
    }

    #[tokio::test]
    async fn test_select_reports_transport_failure() {
        let mut bus = MockBus::new();
        bus.fail_writes(true);
        let mux = Multiplexer::default();

        let err = mux.select(&mut bus, 0).await.unwrap_err();
        assert!(matches!(err, SensorError::ChannelSelect { channel: 0, .. }));
    }

    #[test]
    fn test_channel_bounds() {
        assert!(Channel::new(0).is_ok());
        assert_eq!(Channel::new(7).unwrap().mask(), 0x80);
        assert!(Channel::new(8).is_err());
    }
}
