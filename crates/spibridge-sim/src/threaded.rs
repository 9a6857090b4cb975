//! Two-thread runtime: serial contexts on the caller, bus side on a worker
//!
//! The caller's thread is the serial clock domain. It owns the
//! [`SerialSide`] and drives it from the bit-bang calls. A worker thread is
//! the system clock domain: it runs the [`BusFsm`] against the target as fast
//! as it can. The two only share an [`AtomicHandoff`]; the state word, the
//! counters and the cancellation flag are read-only observers for the caller.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use spibridge_core::bus::{BusFsm, BusState, BusStats, BusTarget};
use spibridge_core::cdc::AtomicHandoff;
use spibridge_core::programmer::BitbangSpiMaster;
use spibridge_core::serial::{FrameOutcome, SerialSide};
use spibridge_core::{BridgeStats, FrameFormat};
use spibridge_regs::RegisterFile;

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::BridgeHost;

/// Bus-side status published by the worker
#[derive(Debug, Default)]
struct BusStatus {
    stats: BusStats,
    last_error: Option<spibridge_core::Error>,
}

/// State shared between the caller and the worker
#[derive(Debug)]
struct Shared {
    handoff: AtomicHandoff,
    cancel: AtomicBool,
    state: AtomicU8,
    cycles: AtomicU64,
    status: Mutex<BusStatus>,
}

impl Shared {
    fn state(&self) -> BusState {
        BusState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(BusState::Idle)
    }
}

/// Bridge whose bus side runs on its own thread
pub struct ThreadedBridge<T: BusTarget + Send + 'static> {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<T>>,
    serial: SerialSide,
    format: FrameFormat,
    half_period: Duration,
    turnaround_timeout: Duration,
    settle_timeout: Duration,
    cs: bool,
    sck: bool,
    mosi: bool,
    last_outcome: Option<FrameOutcome>,
}

impl ThreadedBridge<RegisterFile> {
    /// Run a bridge in front of the register file described by `config`
    pub fn with_registers(config: &SimConfig) -> Result<Self> {
        Self::spawn(config, RegisterFile::new(config.register_config()))
    }
}

impl<T: BusTarget + Send + 'static> ThreadedBridge<T> {
    /// Start the bus worker with `target`
    pub fn spawn(config: &SimConfig, target: T) -> Result<Self> {
        config.validate()?;
        let bridge = config.bridge_config()?;
        bridge.validate()?;

        let shared = Arc::new(Shared {
            handoff: AtomicHandoff::new(),
            cancel: AtomicBool::new(false),
            state: AtomicU8::new(BusState::Idle as u8),
            cycles: AtomicU64::new(0),
            status: Mutex::new(BusStatus::default()),
        });
        let fsm = BusFsm::new(bridge.format, bridge.ack_timeout);
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("spibridge-bus".into())
            .spawn(move || run_bus(&worker_shared, fsm, target))
            .map_err(SimError::WorkerSpawn)?;
        log::debug!("bus worker started");

        Ok(Self {
            shared,
            worker: Some(worker),
            serial: SerialSide::new(bridge.format),
            format: bridge.format,
            half_period: config.thread_half_period,
            turnaround_timeout: config.thread_turnaround_timeout,
            settle_timeout: config.thread_settle_timeout,
            cs: false,
            sck: false,
            mosi: false,
            last_outcome: None,
        })
    }

    /// How the last frame ended
    pub fn last_outcome(&self) -> Option<FrameOutcome> {
        self.last_outcome
    }

    /// Stop the worker and take the target back
    pub fn shutdown(mut self) -> Result<T> {
        self.stop()
    }

    fn stop(&mut self) -> Result<T> {
        self.shared.cancel.store(true, Ordering::Release);
        let worker = self.worker.take().ok_or(SimError::WorkerPanicked)?;
        let target = worker.join().map_err(|_| SimError::WorkerPanicked)?;
        log::debug!("bus worker stopped");
        Ok(target)
    }

    fn idle(&self) -> bool {
        !self.serial.is_selected()
            && !self.shared.handoff.bus_in_flight()
            && self.shared.state() == BusState::Idle
    }

    /// Wait until the worker has completed `cycles` more clocks
    fn wait_cycles(&self, cycles: u64, deadline: Instant) -> bool {
        let target = self.shared.cycles.load(Ordering::Acquire) + cycles;
        while self.shared.cycles.load(Ordering::Acquire) < target {
            if Instant::now() >= deadline || self.worker_finished() {
                return false;
            }
            thread::yield_now();
        }
        true
    }

    fn worker_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |w| w.is_finished())
    }
}

fn run_bus<T: BusTarget>(shared: &Shared, mut fsm: BusFsm, mut target: T) -> T {
    let mut link = &shared.handoff;
    let mut published = fsm.stats();
    while !shared.cancel.load(Ordering::Acquire) {
        fsm.clock(&mut link, &mut target);
        shared.state.store(fsm.state() as u8, Ordering::Release);
        if fsm.stats() != published {
            published = fsm.stats();
            if let Ok(mut status) = shared.status.lock() {
                status.stats = published;
                status.last_error = fsm.last_error();
            }
        }
        shared.cycles.fetch_add(1, Ordering::AcqRel);
        if !fsm.state().is_busy() {
            thread::yield_now();
        }
    }
    target
}

impl<T: BusTarget + Send + 'static> Drop for ThreadedBridge<T> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop() {
                log::warn!("bus worker: {}", e);
            }
        }
    }
}

impl<T: BusTarget + Send + 'static> BitbangSpiMaster for ThreadedBridge<T> {
    fn set_cs(&mut self, active: bool) {
        if active == self.cs {
            return;
        }
        self.cs = active;
        let mut link = &self.shared.handoff;
        if active {
            self.serial.select(&mut link);
        } else if let Some(outcome) = self.serial.deselect(&mut link) {
            log::trace!("threaded: {:?}", outcome);
            self.last_outcome = Some(outcome);
        }
    }

    fn set_sck(&mut self, high: bool) {
        let mut link = &self.shared.handoff;
        match (self.sck, high) {
            (false, true) => self.serial.rising_edge(&mut link, self.mosi),
            (true, false) => self.serial.falling_edge(&mut link),
            _ => {}
        }
        self.sck = high;
    }

    fn set_mosi(&mut self, high: bool) {
        self.mosi = high;
    }

    fn get_miso(&self) -> bool {
        self.serial.sdo()
    }

    fn half_period_delay(&mut self) {
        if !self.half_period.is_zero() {
            thread::sleep(self.half_period);
        }
    }

    fn turnaround(&mut self) {
        let start = Instant::now();
        while !self.shared.handoff.result_ready() {
            if start.elapsed() >= self.turnaround_timeout || self.worker_finished() {
                log::warn!(
                    "no read data after {:?} (bus {})",
                    self.turnaround_timeout,
                    self.shared.state()
                );
                return;
            }
            thread::yield_now();
        }
    }
}

impl<T: BusTarget + Send + 'static> BridgeHost for ThreadedBridge<T> {
    fn format(&self) -> FrameFormat {
        self.format
    }

    fn settle(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.settle_timeout;
        loop {
            // an event taken inside a clock is only reflected in the state
            // word once that clock has completed
            if self.idle() && self.wait_cycles(2, deadline) && self.idle() {
                return Ok(());
            }
            if Instant::now() >= deadline || self.worker_finished() {
                return Err(SimError::Timeout {
                    millis: self.settle_timeout.as_millis() as u64,
                    state: self.shared.state(),
                });
            }
            thread::yield_now();
        }
    }

    fn stats(&self) -> BridgeStats {
        let bus = self
            .shared
            .status
            .lock()
            .map(|status| status.stats)
            .unwrap_or_default();
        BridgeStats {
            serial: self.serial.stats(),
            bus,
        }
    }

    fn bus_state(&self) -> BusState {
        self.shared.state()
    }

    fn last_bus_error(&self) -> Option<spibridge_core::Error> {
        self.shared
            .status
            .lock()
            .ok()
            .and_then(|status| status.last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spibridge_core::frame::Transaction;
    use spibridge_regs::AckPolicy;

    fn config() -> SimConfig {
        SimConfig::default().with_thread_half_period(Duration::ZERO)
    }

    #[test]
    fn test_round_trip() {
        let mut bridge = ThreadedBridge::with_registers(&config()).unwrap();
        for address in 2..40u32 {
            bridge.write_register(address, address * 0x0101).unwrap();
        }
        for address in 2..40u32 {
            assert_eq!(bridge.read_register(address).unwrap(), address * 0x0101);
        }
        let stats = bridge.stats();
        assert_eq!(stats.bus.writes, 38);
        assert_eq!(stats.bus.reads, 38);
        assert_eq!(stats.serial.results_accepted, 38);
    }

    #[test]
    fn test_id_registers() {
        let mut bridge = ThreadedBridge::with_registers(&config()).unwrap();
        assert_eq!(bridge.read_register(0).unwrap(), 0xAAAA);
        assert_eq!(bridge.read_register(1).unwrap(), 0x5555);
    }

    #[test]
    fn test_wait_states() {
        let config = config().with_ack(AckPolicy::WaitStates(50));
        let mut bridge = ThreadedBridge::with_registers(&config).unwrap();
        bridge.write_register(0x22, 0x1234).unwrap();
        assert_eq!(bridge.read_register(0x22).unwrap(), 0x1234);
        assert!(bridge.stats().bus.wait_cycles >= 100);
    }

    #[test]
    fn test_timeout_reported() {
        let config = config()
            .with_ack(AckPolicy::Never)
            .with_ack_timeout(Some(16));
        let mut bridge = ThreadedBridge::with_registers(&config).unwrap();
        bridge.write_register(0x05, 0x1).unwrap();
        assert_eq!(
            bridge.last_bus_error(),
            Some(spibridge_core::Error::BusTimeout {
                address: 0x05,
                write: true
            })
        );
        assert_eq!(bridge.stats().bus.timeouts, 1);
    }

    #[test]
    fn test_shutdown_returns_target() {
        let mut bridge = ThreadedBridge::with_registers(&config()).unwrap();
        bridge.write_register(0x10, 0xBEEF).unwrap();
        let regs = bridge.shutdown().unwrap();
        assert_eq!(regs.peek(0x10), 0xBEEF);
        assert_eq!(
            regs.history().last().copied(),
            Some(Transaction::write(0x10, 0xBEEF))
        );
    }
}
