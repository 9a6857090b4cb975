//! Discrete-event simulator with two unrelated clocks
//!
//! Time is kept in picoseconds. The system clock ticks at a fixed period
//! from a phase offset; the serial clock is whatever the bit-bang master
//! makes of it, one half period per [`half_period_delay`] call. Every system
//! edge that falls inside a delay is run before the delay returns, so the
//! two clocks interleave exactly as their periods dictate.
//!
//! [`half_period_delay`]: BitbangSpiMaster::half_period_delay

use spibridge_core::bus::{BusState, BusTarget};
use spibridge_core::programmer::BitbangSpiMaster;
use spibridge_core::serial::FrameOutcome;
use spibridge_core::{BridgeStats, FrameFormat, Spi2Wb};
use spibridge_regs::RegisterFile;

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::BridgeHost;

/// Free-running clock
#[derive(Debug, Clone)]
struct Clock {
    period_ps: u64,
    next_edge_ps: u64,
    edges: u64,
}

impl Clock {
    fn new(period_ps: u64, phase_ps: u64) -> Self {
        Self {
            period_ps: period_ps.max(1),
            next_edge_ps: phase_ps,
            edges: 0,
        }
    }

    /// Take the next edge if it is not later than `until`
    fn edge_before(&mut self, until: u64) -> Option<u64> {
        if self.next_edge_ps > until {
            return None;
        }
        let t = self.next_edge_ps;
        self.next_edge_ps += self.period_ps;
        self.edges += 1;
        Some(t)
    }
}

/// Simulated bridge driven through its serial pins
pub struct Simulator<T: BusTarget> {
    bridge: Spi2Wb,
    target: T,
    format: FrameFormat,
    sys: Clock,
    half_period_ps: u64,
    now_ps: u64,
    turnaround_cycles: u32,
    settle_cycles: u64,
    cs: bool,
    sck: bool,
    mosi: bool,
    last_outcome: Option<FrameOutcome>,
}

impl Simulator<RegisterFile> {
    /// Simulate a bridge in front of the register file described by `config`
    pub fn with_registers(config: &SimConfig) -> Result<Self> {
        Self::new(config, RegisterFile::new(config.register_config()))
    }
}

impl<T: BusTarget> Simulator<T> {
    /// Simulate a bridge in front of `target`
    pub fn new(config: &SimConfig, target: T) -> Result<Self> {
        config.validate()?;
        let bridge = Spi2Wb::new(config.bridge_config()?)?;
        log::debug!(
            "sim: sys period {} ps, serial half period {} ps (ratio {:.2})",
            config.sys_period_ps(),
            config.half_period_ps(),
            config.clock_ratio()
        );
        Ok(Self {
            format: bridge.config().format,
            bridge,
            target,
            sys: Clock::new(config.sys_period_ps(), config.sys_phase_ps),
            half_period_ps: config.half_period_ps(),
            now_ps: 0,
            turnaround_cycles: config.turnaround_cycles,
            settle_cycles: config.settle_cycles,
            cs: false,
            sck: false,
            mosi: false,
            last_outcome: None,
        })
    }

    /// Advance simulated time, running every system edge on the way
    pub fn advance(&mut self, ps: u64) {
        let until = self.now_ps + ps;
        while let Some(t) = self.sys.edge_before(until) {
            self.now_ps = t;
            self.bridge.sys_clock(&mut self.target);
        }
        self.now_ps = until;
    }

    /// Run `cycles` system clocks
    pub fn run_sys_cycles(&mut self, cycles: u64) {
        self.advance(cycles * self.sys.period_ps);
    }

    /// Run the system clock until the bridge is quiescent
    ///
    /// Returns the number of cycles it took, or [`SimError::BusStalled`] once
    /// `max_cycles` have passed.
    pub fn settle_within(&mut self, max_cycles: u64) -> Result<u64> {
        let mut cycles = 0;
        while !self.bridge.is_quiescent() {
            if cycles >= max_cycles {
                return Err(SimError::BusStalled {
                    cycles,
                    state: self.bridge.bus_state(),
                });
            }
            self.run_sys_cycles(1);
            cycles += 1;
        }
        Ok(cycles)
    }

    /// External reset of the bridge and the target
    pub fn reset(&mut self) {
        self.bridge.reset();
        self.target.reset();
        self.cs = false;
        self.sck = false;
        self.last_outcome = None;
    }

    /// Current simulated time in picoseconds
    pub fn now_ps(&self) -> u64 {
        self.now_ps
    }

    /// System clock edges so far
    pub fn sys_cycles(&self) -> u64 {
        self.sys.edges
    }

    /// How the last frame ended
    pub fn last_outcome(&self) -> Option<FrameOutcome> {
        self.last_outcome
    }

    /// The bridge model
    pub fn bridge(&self) -> &Spi2Wb {
        &self.bridge
    }

    /// The bus target
    pub fn target(&self) -> &T {
        &self.target
    }

    /// The bus target, mutably
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Consume the simulator, returning the target
    pub fn into_target(self) -> T {
        self.target
    }
}

impl<T: BusTarget> BitbangSpiMaster for Simulator<T> {
    fn set_cs(&mut self, active: bool) {
        if active == self.cs {
            return;
        }
        self.cs = active;
        if let Some(outcome) = self.bridge.set_select(active) {
            log::trace!("sim: {:?} at {} ps", outcome, self.now_ps);
            self.last_outcome = Some(outcome);
        }
    }

    fn set_sck(&mut self, high: bool) {
        match (self.sck, high) {
            (false, true) => self.bridge.sck_rising(self.mosi),
            (true, false) => self.bridge.sck_falling(),
            _ => {}
        }
        self.sck = high;
    }

    fn set_mosi(&mut self, high: bool) {
        self.mosi = high;
    }

    fn get_miso(&self) -> bool {
        self.bridge.sdo()
    }

    fn half_period_delay(&mut self) {
        self.advance(self.half_period_ps);
    }

    fn turnaround(&mut self) {
        let mut cycles = 0;
        while cycles < self.turnaround_cycles && !self.bridge.read_result_pending() {
            self.run_sys_cycles(1);
            cycles += 1;
        }
        if cycles > 0 {
            log::trace!("sim: stretched clock for {} system cycles", cycles);
        }
    }
}

impl<T: BusTarget> BridgeHost for Simulator<T> {
    fn format(&self) -> FrameFormat {
        self.format
    }

    fn settle(&mut self) -> Result<()> {
        self.settle_within(self.settle_cycles).map(|_| ())
    }

    fn stats(&self) -> BridgeStats {
        self.bridge.stats()
    }

    fn bus_state(&self) -> BusState {
        self.bridge.bus_state()
    }

    fn last_bus_error(&self) -> Option<spibridge_core::Error> {
        self.bridge.last_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use spibridge_core::frame::Transaction;
    use spibridge_core::protocol;
    use spibridge_regs::AckPolicy;

    /// 100 MHz system clock and the given serial half period in system periods
    fn config(ratio: f64) -> SimConfig {
        SimConfig::default()
            .with_sys_clock_hz(100_000_000)
            .with_half_period_ps((ratio * 10_000.0) as u64)
    }

    fn sim(config: &SimConfig) -> Simulator<RegisterFile> {
        Simulator::with_registers(config).unwrap()
    }

    #[test]
    fn test_scenario_write_then_read_beef() {
        let mut sim = sim(&config(50.0));
        let fmt = sim.format();

        sim.write_register(0x10, 0xBEEF).unwrap();
        assert_eq!(
            sim.last_outcome(),
            Some(FrameOutcome::Write {
                address: 0x10,
                data: 0xBEEF
            })
        );
        assert_eq!(sim.target().peek(0x10), 0xBEEF);
        assert_eq!(
            sim.bridge().last_transaction(),
            Some(Transaction::write(0x10, 0xBEEF))
        );

        let frame = protocol::transfer_frame(&mut sim, &fmt, &Transaction::read(0x10)).unwrap();
        sim.settle().unwrap();
        assert_eq!(frame & fmt.data_mask(), 0xBEEF);
        assert_eq!(sim.bridge().last_switch_bit(), Some(8));
        assert_eq!(sim.bridge().bit_count(), 0);
    }

    #[test]
    fn test_id_registers() {
        let mut sim = sim(&config(10.0));
        assert_eq!(sim.read_register(0).unwrap(), 0xAAAA);
        assert_eq!(sim.read_register(1).unwrap(), 0x5555);
        sim.write_register(0, 0x1234).unwrap();
        assert_eq!(sim.read_register(0).unwrap(), 0xAAAA);
    }

    #[test]
    fn test_one_result_per_request_at_several_ratios() {
        for ratio in [50.0, 7.5, 2.3, 1.0, 0.6] {
            let mut sim = sim(&config(ratio));
            let mut rng = StdRng::seed_from_u64(0x5EED);
            for _ in 0..20 {
                let address = rng.random_range(2..128u32);
                let data = rng.random_range(0..=0xFFFFu32);
                sim.write_register(address, data).unwrap();
                assert_eq!(
                    sim.read_register(address).unwrap(),
                    data,
                    "ratio {}",
                    ratio
                );
                assert_eq!(sim.bridge().last_switch_bit(), Some(8), "ratio {}", ratio);
            }
            let stats = sim.stats();
            assert_eq!(stats.serial.read_requests, 20);
            assert_eq!(stats.serial.results_accepted, 20);
            assert_eq!(stats.serial.stale_results, 0);
            assert_eq!(stats.bus.reads, 20);
            assert_eq!(stats.bus.writes, 20);
        }
    }

    #[test]
    fn test_short_frames_issue_nothing() {
        let mut sim = sim(&config(5.0));
        let fmt = sim.format();
        for bits in 1..fmt.decode_point() {
            for tx in [Transaction::read(0x10), Transaction::write(0x10, 0xBEEF)] {
                protocol::transfer_partial(&mut sim, &fmt, &tx, bits).unwrap();
                sim.settle().unwrap();
                assert_eq!(sim.last_outcome(), Some(FrameOutcome::Short { bits }));
                assert_eq!(sim.bridge().bit_count(), 0);
            }
        }
        let stats = sim.stats();
        assert_eq!(stats.bus.reads + stats.bus.writes, 0);
        assert_eq!(stats.serial.short_frames, 2 * 7);
        assert_eq!(sim.target().history().count(), 0);
    }

    #[test]
    fn test_truncated_and_overlong_writes_discarded() {
        let mut sim = sim(&config(5.0));
        let fmt = sim.format();
        let tx = Transaction::write(0x20, 0x1234);
        protocol::transfer_partial(&mut sim, &fmt, &tx, 20).unwrap();
        sim.settle().unwrap();
        assert_eq!(sim.last_outcome(), Some(FrameOutcome::Malformed { bits: 20 }));
        protocol::transfer_partial(&mut sim, &fmt, &tx, 30).unwrap();
        sim.settle().unwrap();
        assert!(matches!(
            sim.last_outcome(),
            Some(FrameOutcome::Malformed { .. })
        ));
        assert_eq!(sim.stats().bus.writes, 0);
        assert_eq!(sim.target().peek(0x20), 0);
    }

    #[test]
    fn test_back_to_back_frames_faster_than_bus() {
        let mut sim = sim(&config(0.1));
        let fmt = sim.format();

        protocol::write_register(&mut sim, &fmt, 0x10, 0xBEEF).unwrap();
        protocol::transfer_partial(&mut sim, &fmt, &Transaction::write(0x11, 0x1111), 1).unwrap();
        assert_eq!(sim.last_outcome(), Some(FrameOutcome::Short { bits: 1 }));
        protocol::write_register(&mut sim, &fmt, 0x12, 0x1234).unwrap();
        sim.settle().unwrap();

        assert_eq!(sim.target().peek(0x10), 0xBEEF);
        assert_eq!(sim.target().peek(0x11), 0);
        assert_eq!(sim.target().peek(0x12), 0x1234);
        let stats = sim.stats();
        assert_eq!(stats.bus.writes, 2);
        assert_eq!(stats.serial.short_frames, 1);
        assert_eq!(stats.serial.handoff_faults, 0);
    }

    #[test]
    fn test_glitch_rejection() {
        let mut sim = sim(&config(5.0));
        sim.write_register(0x10, 0xBEEF).unwrap();
        let latched = sim.bridge().latched();

        protocol::select_glitch(&mut sim);
        sim.settle().unwrap();
        assert_eq!(sim.last_outcome(), Some(FrameOutcome::Glitch));
        assert_eq!(sim.bridge().latched(), latched);
        assert_eq!(sim.stats().bus.writes, 1);
        assert_eq!(sim.stats().serial.glitches, 1);
    }

    #[test]
    fn test_late_result_switches_once() {
        let config = config(50.0)
            .with_sync_stages(2, 2)
            .with_turnaround_cycles(0);
        let mut sim = sim(&config);
        let fmt = sim.format();
        sim.write_register(0x10, 0xBEEF).unwrap();

        let frame = protocol::transfer_frame(&mut sim, &fmt, &Transaction::read(0x10)).unwrap();
        sim.settle().unwrap();
        // two serial edges to get through the synchronizer
        assert_eq!(sim.bridge().last_switch_bit(), Some(fmt.decode_point() + 2));
        assert_eq!(frame & 0x3FFF, 0xBEEF >> 2);
        assert_eq!(sim.stats().serial.results_accepted, 1);
        assert_eq!(
            sim.last_outcome(),
            Some(FrameOutcome::Read {
                address: 0x10,
                completed: true
            })
        );
    }

    #[test]
    fn test_abandoned_read_result_is_dropped() {
        let config = config(2.0)
            .with_ack(AckPolicy::WaitStates(200))
            .with_turnaround_cycles(0);
        let mut sim = sim(&config);
        sim.target_mut().poke(0x30, 0x0BAD);
        sim.target_mut().poke(0x31, 0x600D);

        sim.read_register(0x30).unwrap();
        assert_eq!(
            sim.last_outcome(),
            Some(FrameOutcome::Read {
                address: 0x30,
                completed: false
            })
        );

        sim.target_mut().set_ack_policy(AckPolicy::Immediate);
        sim.turnaround_cycles = 64;
        assert_eq!(sim.read_register(0x31).unwrap(), 0x600D);
        let stats = sim.stats();
        assert_eq!(stats.serial.stale_results, 1);
        assert_eq!(stats.serial.abandoned_reads, 1);
        assert_eq!(stats.bus.reads, 2);
    }

    #[test]
    fn test_stall_then_reset() {
        let config = config(5.0).with_ack(AckPolicy::Never);
        let mut sim = sim(&config);
        let fmt = sim.format();

        protocol::write_register(&mut sim, &fmt, 0x05, 0x1234).unwrap();
        let err = sim.settle_within(1000).unwrap_err();
        assert!(matches!(
            err,
            SimError::BusStalled {
                state: BusState::WriteWaitAck,
                ..
            }
        ));

        sim.reset();
        sim.target_mut().set_ack_policy(AckPolicy::Immediate);
        assert!(sim.bridge().is_quiescent());
        sim.write_register(0x05, 0x1234).unwrap();
        assert_eq!(sim.target().peek(0x05), 0x1234);
    }

    #[test]
    fn test_timeout_returns_error_word() {
        let config = config(5.0)
            .with_ack(AckPolicy::Never)
            .with_ack_timeout(Some(32));
        let mut sim = sim(&config);
        assert_eq!(sim.read_register(0x07).unwrap(), 0xFFFF);
        sim.write_register(0x07, 0x1).unwrap();
        assert_eq!(sim.stats().bus.timeouts, 2);
        assert_eq!(
            sim.last_bus_error(),
            Some(spibridge_core::Error::BusTimeout {
                address: 0x07,
                write: true
            })
        );
    }

    #[test]
    fn test_narrow_frame_format() {
        let config = config(4.0).with_format(3, 8);
        let mut sim = sim(&config);
        for address in 2..8 {
            sim.write_register(address, address * 0x11).unwrap();
        }
        for address in 2..8 {
            assert_eq!(sim.read_register(address).unwrap(), address * 0x11);
        }
    }
}
