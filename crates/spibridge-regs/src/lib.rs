//! spibridge-regs - In-memory register file behind the bridge
//!
//! This crate provides a bus target that emulates a bank of word registers.
//! It's useful for testing the bridge without a real bus fabric: the
//! acknowledge behaviour is configurable, some registers can be made
//! read-only, and every completed access is recorded.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::collections::VecDeque;
#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

#[cfg(feature = "alloc")]
use spibridge_core::bus::{BusResponse, BusSignals, BusTarget};
#[cfg(feature = "alloc")]
use spibridge_core::frame::Transaction;

/// ID words of the reference board's register bank
pub const ID_REGISTERS: [(u32, u32); 2] = [(0, 0xAAAA), (1, 0x5555)];

/// When the register file acknowledges a strobed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// Acknowledge in the first strobed cycle
    #[default]
    Immediate,
    /// Insert this many wait cycles before acknowledging
    WaitStates(u32),
    /// Never acknowledge (a target that hangs the bus)
    Never,
}

/// Configuration for the register file
#[derive(Debug, Clone)]
#[cfg(feature = "alloc")]
pub struct RegisterFileConfig {
    /// Number of words; addresses alias modulo this depth
    pub depth: usize,
    /// Width of each register in bits
    pub data_width: u32,
    /// Acknowledge behaviour
    pub ack: AckPolicy,
    /// Initial register values
    pub preload: Vec<(u32, u32)>,
    /// Registers that ignore writes
    pub read_only: Vec<u32>,
    /// Number of accesses kept in the history
    pub history_len: usize,
}

#[cfg(feature = "alloc")]
impl Default for RegisterFileConfig {
    fn default() -> Self {
        Self {
            depth: 128,
            data_width: 16,
            ack: AckPolicy::Immediate,
            preload: Vec::new(),
            read_only: Vec::new(),
            history_len: 64,
        }
    }
}

#[cfg(feature = "alloc")]
impl RegisterFileConfig {
    /// Add the two read-only ID registers (0xAAAA at 0, 0x5555 at 1)
    pub fn with_id_registers(mut self) -> Self {
        for (address, value) in ID_REGISTERS {
            self.preload.push((address, value));
            self.read_only.push(address);
        }
        self
    }

    /// Set the acknowledge policy
    pub fn with_ack(mut self, ack: AckPolicy) -> Self {
        self.ack = ack;
        self
    }

    /// Set the number of words
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Set the register width
    pub fn with_data_width(mut self, bits: u32) -> Self {
        self.data_width = bits;
        self
    }
}

/// Register file bus target
///
/// Acknowledges each strobed cycle exactly once; the initiator must drop the
/// strobe before the next cycle is acknowledged.
#[cfg(feature = "alloc")]
pub struct RegisterFile {
    config: RegisterFileConfig,
    words: Vec<u32>,
    read_only: Vec<bool>,
    waited: u32,
    acked: bool,
    history: VecDeque<Transaction>,
}

#[cfg(feature = "alloc")]
impl RegisterFile {
    /// Create a register file with the given configuration
    pub fn new(config: RegisterFileConfig) -> Self {
        let depth = config.depth.max(1);
        let mut words = vec![0u32; depth];
        let mut read_only = vec![false; depth];
        for &(address, value) in &config.preload {
            words[address as usize % depth] = value & data_mask(config.data_width);
        }
        for &address in &config.read_only {
            read_only[address as usize % depth] = true;
        }
        Self {
            config,
            words,
            read_only,
            waited: 0,
            acked: false,
            history: VecDeque::new(),
        }
    }

    /// Create a register file with default configuration (128 x 16 bit)
    pub fn new_default() -> Self {
        Self::new(RegisterFileConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &RegisterFileConfig {
        &self.config
    }

    /// Change the acknowledge policy
    pub fn set_ack_policy(&mut self, ack: AckPolicy) {
        self.config.ack = ack;
    }

    /// Read a register without a bus cycle
    pub fn peek(&self, address: u32) -> u32 {
        self.words[self.index(address)]
    }

    /// Write a register without a bus cycle (ignores read-only)
    pub fn poke(&mut self, address: u32, value: u32) {
        let index = self.index(address);
        self.words[index] = value & data_mask(self.config.data_width);
    }

    /// Completed accesses, oldest first
    pub fn history(&self) -> impl Iterator<Item = &Transaction> {
        self.history.iter()
    }

    /// Forget the access history
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn index(&self, address: u32) -> usize {
        address as usize % self.words.len()
    }

    fn record(&mut self, tx: Transaction) {
        if self.config.history_len == 0 {
            return;
        }
        if self.history.len() == self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back(tx);
    }

    fn access(&mut self, signals: &BusSignals) -> u32 {
        let index = self.index(signals.address);
        if signals.is_write() {
            if self.read_only[index] {
                log::warn!(
                    "ignoring write of 0x{:X} to read-only register 0x{:02X}",
                    signals.data,
                    signals.address
                );
            } else {
                let lanes = lane_mask(signals.select) & data_mask(self.config.data_width);
                let word = &mut self.words[index];
                *word = (*word & !lanes) | (signals.data & lanes);
            }
            self.record(Transaction::write(signals.address, signals.data));
        } else {
            self.record(Transaction {
                data: self.words[index],
                ..Transaction::read(signals.address)
            });
        }
        self.words[index]
    }
}

#[cfg(feature = "alloc")]
impl BusTarget for RegisterFile {
    fn clock(&mut self, signals: &BusSignals) -> BusResponse {
        if !signals.is_strobed() {
            self.waited = 0;
            self.acked = false;
            return BusResponse::default();
        }
        if self.acked {
            return BusResponse::default();
        }
        match self.config.ack {
            AckPolicy::Immediate => {}
            AckPolicy::WaitStates(n) if self.waited >= n => {}
            AckPolicy::WaitStates(_) => {
                self.waited += 1;
                return BusResponse::default();
            }
            AckPolicy::Never => return BusResponse::default(),
        }
        self.acked = true;
        let data = self.access(signals);
        log::trace!(
            "regs {} 0x{:02X} = 0x{:X}",
            if signals.is_write() { "write" } else { "read" },
            signals.address,
            data
        );
        BusResponse::ack(data)
    }

    fn reset(&mut self) {
        self.waited = 0;
        self.acked = false;
    }
}

/// Expand a byte select mask to a bit mask
#[cfg(feature = "alloc")]
fn lane_mask(select: u8) -> u32 {
    (0..4)
        .filter(|lane| select & (1 << lane) != 0)
        .fold(0, |mask, lane| mask | (0xFF << (8 * lane)))
}

#[cfg(feature = "alloc")]
fn data_mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1 << bits) - 1
    }
}
