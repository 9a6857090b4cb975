//! Clocked top level: serial side, handoff and bus side of one bridge

use crate::bus::{BusFsm, BusSignals, BusState, BusStats, BusTarget};
use crate::cdc::{ClockedHandoff, MAX_SYNC_STAGES};
use crate::error::{Error, Result};
use crate::frame::{FrameFormat, Transaction};
use crate::serial::{FrameOutcome, SerialSide, SerialStats};

/// Bridge configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Serial frame field widths
    pub format: FrameFormat,
    /// Acknowledge timeout in system clocks (`None` waits forever)
    pub ack_timeout: Option<u32>,
    /// Synchronizer stages for serial→bus signals (system clock side)
    pub bus_sync_stages: usize,
    /// Synchronizer stages for the read result (serial clock side)
    pub serial_sync_stages: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            format: FrameFormat::default(),
            ack_timeout: None,
            bus_sync_stages: 2,
            // the serial clock is gated by select and must not need extra
            // edges between the address field and the first data bit
            serial_sync_stages: 0,
        }
    }
}

impl BridgeConfig {
    /// Set the frame format
    pub fn with_format(mut self, format: FrameFormat) -> Self {
        self.format = format;
        self
    }

    /// Bound the wait for bus acknowledge
    pub fn with_ack_timeout(mut self, cycles: Option<u32>) -> Self {
        self.ack_timeout = cycles;
        self
    }

    /// Set the system-side synchronizer depth
    pub fn with_bus_sync_stages(mut self, stages: usize) -> Self {
        self.bus_sync_stages = stages;
        self
    }

    /// Set the serial-side synchronizer depth
    pub fn with_serial_sync_stages(mut self, stages: usize) -> Self {
        self.serial_sync_stages = stages;
        self
    }

    /// Check the synchronizer depths
    pub fn validate(&self) -> Result<()> {
        for depth in [self.bus_sync_stages, self.serial_sync_stages] {
            if depth > MAX_SYNC_STAGES {
                return Err(Error::InvalidSyncDepth(depth));
            }
        }
        Ok(())
    }
}

/// Counters of both sides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Serial side
    pub serial: SerialStats,
    /// Bus side
    pub bus: BusStats,
}

/// SPI to Wishbone bridge at clock-edge granularity
///
/// The caller drives the serial pins ([`set_select`](Self::set_select),
/// [`sck_rising`](Self::sck_rising), [`sck_falling`](Self::sck_falling),
/// [`sdo`](Self::sdo)) and the system clock ([`sys_clock`](Self::sys_clock))
/// from two independent time bases. The serial side and the bus side only
/// meet in the [`ClockedHandoff`].
#[derive(Debug, Clone)]
pub struct Spi2Wb {
    config: BridgeConfig,
    serial: SerialSide,
    handoff: ClockedHandoff,
    bus: BusFsm,
}

impl Spi2Wb {
    /// Create a bridge in its reset state
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            serial: SerialSide::new(config.format),
            handoff: ClockedHandoff::new(config.bus_sync_stages, config.serial_sync_stages)?,
            bus: BusFsm::new(config.format, config.ack_timeout),
        })
    }

    /// Drive the select line
    ///
    /// Deasserting select returns how the frame ended.
    pub fn set_select(&mut self, active: bool) -> Option<FrameOutcome> {
        if active {
            self.serial.select(&mut self.handoff);
            None
        } else {
            self.serial.deselect(&mut self.handoff)
        }
    }

    /// Serial clock rising edge, sampling `sdi`
    pub fn sck_rising(&mut self, sdi: bool) {
        self.handoff.clock_serial();
        self.serial.rising_edge(&mut self.handoff, sdi);
    }

    /// Serial clock falling edge
    pub fn sck_falling(&mut self) {
        self.serial.falling_edge(&mut self.handoff);
    }

    /// Serial output line
    pub fn sdo(&self) -> bool {
        self.serial.sdo()
    }

    /// One system clock edge against `target`
    pub fn sys_clock<T: BusTarget + ?Sized>(&mut self, target: &mut T) {
        self.handoff.clock_bus();
        self.bus.clock(&mut self.handoff, target);
    }

    /// External reset of every state machine and synchronizer
    pub fn reset(&mut self) {
        log::debug!("bridge reset (bus was {})", self.bus.state());
        self.serial.reset();
        self.handoff.reset();
        self.bus.reset();
    }

    /// Whether nothing is selected, in flight towards the bus, or running on it
    pub fn is_quiescent(&self) -> bool {
        !self.serial.is_selected()
            && !self.handoff.bus_in_flight()
            && self.bus.state() == BusState::Idle
    }

    /// Whether a read result has been published and not yet taken by the
    /// serial side
    pub fn read_result_pending(&self) -> bool {
        self.handoff.result_in_flight()
    }

    /// Configuration in use
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Bus state machine state
    pub fn bus_state(&self) -> BusState {
        self.bus.state()
    }

    /// Signals driven on the bus during the next cycle
    pub fn bus_signals(&self) -> &BusSignals {
        self.bus.signals()
    }

    /// Serial bit counter
    pub fn bit_count(&self) -> u32 {
        self.serial.bit_count()
    }

    /// Output latch contents
    pub fn latched(&self) -> u32 {
        self.serial.latched()
    }

    /// Bit position at which read data replaced the echo in the last frame
    pub fn last_switch_bit(&self) -> Option<u32> {
        self.serial.last_switch_bit()
    }

    /// Last completed bus transaction
    pub fn last_transaction(&self) -> Option<Transaction> {
        self.bus.last_transaction()
    }

    /// Last bus error
    pub fn last_error(&self) -> Option<Error> {
        self.bus.last_error()
    }

    /// Counters of both sides
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            serial: self.serial.stats(),
            bus: self.bus.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusResponse, BusSignals};

    struct Memory {
        words: [u32; 128],
        ack: bool,
    }

    impl Memory {
        fn new() -> Self {
            Self {
                words: [0; 128],
                ack: true,
            }
        }
    }

    impl BusTarget for Memory {
        fn clock(&mut self, signals: &BusSignals) -> BusResponse {
            if !signals.is_strobed() || !self.ack {
                return BusResponse::default();
            }
            let slot = &mut self.words[signals.address as usize % 128];
            if signals.is_write() {
                *slot = signals.data;
            }
            BusResponse::ack(*slot)
        }
    }

    /// Clock one frame with `ratio` system clocks per serial half period
    fn frame(bridge: &mut Spi2Wb, mem: &mut Memory, bits: u32, ratio: usize) -> (u32, Option<FrameOutcome>) {
        let width = bridge.config().format.width();
        let mut response = 0;
        bridge.set_select(true);
        for i in 0..width {
            bridge.sck_falling();
            for _ in 0..ratio {
                bridge.sys_clock(mem);
            }
            bridge.sck_rising((bits >> (width - 1 - i)) & 1 != 0);
            response = (response << 1) | bridge.sdo() as u32;
            for _ in 0..ratio {
                bridge.sys_clock(mem);
            }
        }
        let outcome = bridge.set_select(false);
        for _ in 0..16 {
            bridge.sys_clock(mem);
        }
        (response, outcome)
    }

    #[test]
    fn test_write_then_read() {
        let mut bridge = Spi2Wb::new(BridgeConfig::default()).unwrap();
        let mut mem = Memory::new();
        let fmt = bridge.config().format;

        let write = fmt.encode(&Transaction::write(0x10, 0xBEEF)).unwrap();
        frame(&mut bridge, &mut mem, write, 10);
        assert_eq!(mem.words[0x10], 0xBEEF);
        assert!(bridge.is_quiescent());

        let read = fmt.encode(&Transaction::read(0x10)).unwrap();
        let (response, outcome) = frame(&mut bridge, &mut mem, read, 10);
        assert_eq!(response & fmt.data_mask(), 0xBEEF);
        assert_eq!(bridge.last_switch_bit(), Some(fmt.decode_point()));
        assert_eq!(
            outcome,
            Some(FrameOutcome::Read {
                address: 0x10,
                completed: true
            })
        );
        assert!(bridge.is_quiescent());
        let stats = bridge.stats();
        assert_eq!(stats.bus.reads, 1);
        assert_eq!(stats.bus.writes, 1);
    }

    #[test]
    fn test_reset_recovers_from_stall() {
        let mut bridge = Spi2Wb::new(BridgeConfig::default()).unwrap();
        let mut mem = Memory::new();
        mem.ack = false;
        let fmt = bridge.config().format;

        let write = fmt.encode(&Transaction::write(0x01, 0x1234)).unwrap();
        frame(&mut bridge, &mut mem, write, 4);
        assert_eq!(bridge.bus_state(), BusState::WriteWaitAck);
        assert!(!bridge.is_quiescent());

        bridge.reset();
        mem.ack = true;
        assert!(bridge.is_quiescent());
        assert!(!bridge.bus_signals().is_strobed());

        frame(&mut bridge, &mut mem, write, 4);
        assert_eq!(mem.words[0x01], 0x1234);
    }

    #[test]
    fn test_rejects_deep_synchronizer() {
        let config = BridgeConfig::default().with_bus_sync_stages(MAX_SYNC_STAGES + 1);
        assert!(Spi2Wb::new(config).is_err());
    }
}
