//! In-memory bus used by the unit tests.
//!
//! Tracks the multiplexer selection the same way the hardware does, so a
//! register can be served per channel.

use super::BusTransport;
use crate::errors::{TransportError, TransportResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusWrite {
    Register { address: u8, reg: u8, byte: u8 },
    Command { address: u8, byte: u8 },
}

#[derive(Default)]
struct MockState {
    mux_address: u8,
    selected: Option<u8>,
    registers: HashMap<(Option<u8>, u8, u8), Vec<u8>>,
    writes: Vec<BusWrite>,
    failing_channels: HashSet<u8>,
    fail_writes: bool,
}

/// Cloneable handle; clones share the same simulated bus
#[derive(Clone)]
pub struct MockBus {
    state: Arc<Mutex<MockState>>,
}

impl MockBus {
    pub fn new() -> Self {
        let state = MockState {
            mux_address: 0x70,
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Serve `bytes` for `reg` on `address`. `None` matches every channel.
    pub fn set_register(&self, channel: Option<u8>, address: u8, reg: u8, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .registers
            .insert((channel, address, reg), bytes.to_vec());
    }

    /// Make every read fail while `channel` is selected
    pub fn fail_reads_on(&self, channel: u8) {
        self.state.lock().unwrap().failing_channels.insert(channel);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn writes(&self) -> Vec<BusWrite> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn selected(&self) -> Option<u8> {
        self.state.lock().unwrap().selected
    }
}

#[async_trait]
impl BusTransport for MockBus {
    async fn write_byte(&mut self, address: u8, reg: u8, byte: u8) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(TransportError::Io("simulated write failure".to_string()));
        }
        state.writes.push(BusWrite::Register { address, reg, byte });
        Ok(())
    }

    async fn send_byte(&mut self, address: u8, byte: u8) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(TransportError::Io("simulated write failure".to_string()));
        }
        if address == state.mux_address {
            state.selected = (0..8u8).find(|ch| byte == 1 << ch);
        }
        state.writes.push(BusWrite::Command { address, byte });
        Ok(())
    }

    async fn read_bytes(&mut self, address: u8, reg: u8, len: usize) -> TransportResult<Vec<u8>> {
        let state = self.state.lock().unwrap();
        if let Some(ch) = state.selected {
            if state.failing_channels.contains(&ch) {
                return Err(TransportError::Io(format!("simulated read failure on ch{}", ch)));
            }
        }
        let bytes = state
            .registers
            .get(&(state.selected, address, reg))
            .or_else(|| state.registers.get(&(None, address, reg)))
            .map(|b| b.iter().copied().take(len).collect())
            .unwrap_or_else(|| vec![0; len]);
        Ok(bytes)
    }
}
