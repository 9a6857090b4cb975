//! spibridge-sim - Harnesses that drive the bridge through its serial pins
//!
//! Two ways of running a [`spibridge_core::Spi2Wb`]-style bridge in front of
//! a bus target:
//!
//! - [`Simulator`]: a deterministic discrete-event model. The system clock
//!   and the serial clock are two independent periods on a picosecond time
//!   line, so clock ratios from far above to below one can be reproduced
//!   exactly.
//! - [`ThreadedBridge`]: the serial side runs on the caller's thread and the
//!   bus state machine on a worker thread, talking only through the atomic
//!   mailboxes of [`spibridge_core::cdc::AtomicHandoff`].
//!
//! Both implement [`BridgeHost`], which adds register-level helpers on top
//! of the bit-bang master they already are.
//!
//! # Example
//!
//! ```
//! use spibridge_sim::{BridgeHost, SimConfig, Simulator};
//!
//! let config = SimConfig::default();
//! let mut sim = Simulator::with_registers(&config)?;
//! sim.write_register(0x10, 0xBEEF)?;
//! assert_eq!(sim.read_register(0x10)?, 0xBEEF);
//! assert_eq!(sim.read_register(0x00)?, 0xAAAA);
//! # Ok::<(), spibridge_sim::SimError>(())
//! ```
//!
//! # Options
//!
//! ```bash
//! spibridge -s sysclk=100000,spispeed=2000,ack=wait:4 stress -n 1000
//! spibridge -s addr_bits=3,data_bits=8,turnaround=0 read 0x05
//! ```

pub mod config;
pub mod error;
pub mod simulator;
pub mod threaded;

use spibridge_core::bus::BusState;
use spibridge_core::programmer::BitbangSpiMaster;
use spibridge_core::{protocol, BridgeStats, FrameFormat};

// Re-exports
pub use config::{parse_ack_policy, parse_options, SimConfig};
pub use error::{Result, SimError};
pub use simulator::Simulator;
pub use threaded::ThreadedBridge;

/// A bridge the host can talk to at register level
///
/// The provided methods clock one frame through the bit-bang master and
/// then wait for the bus side to finish with it.
pub trait BridgeHost: BitbangSpiMaster {
    /// Frame format of the bridge
    fn format(&self) -> FrameFormat;

    /// Wait until the bus side is idle and nothing is in flight
    fn settle(&mut self) -> Result<()>;

    /// Counters of both sides
    fn stats(&self) -> BridgeStats;

    /// Current bus state machine state
    fn bus_state(&self) -> BusState;

    /// Last error reported by the bus side
    fn last_bus_error(&self) -> Option<spibridge_core::Error>;

    /// Write one register and wait for the bus cycle
    fn write_register(&mut self, address: u32, data: u32) -> Result<()> {
        let format = self.format();
        protocol::write_register(self, &format, address, data)?;
        self.settle()
    }

    /// Read one register
    fn read_register(&mut self, address: u32) -> Result<u32> {
        let format = self.format();
        let data = protocol::read_register(self, &format, address)?;
        self.settle()?;
        Ok(data)
    }
}

/// Open a bridge in front of the register file described by `config`
///
/// This is a convenience function for the CLI dispatch: `threaded` selects
/// the two-thread runtime instead of the simulator.
pub fn open_bridge(config: &SimConfig, threaded: bool) -> Result<Box<dyn BridgeHost>> {
    if threaded {
        Ok(Box::new(ThreadedBridge::with_registers(config)?))
    } else {
        Ok(Box::new(Simulator::with_registers(config)?))
    }
}
