//! Wishbone-style bus signals and the target seam

use bitflags::bitflags;

bitflags! {
    /// Bus control lines driven by the initiator
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BusControl: u8 {
        /// Bus cycle in progress
        const CYC = 1 << 0;
        /// Strobe: address and data are valid
        const STB = 1 << 1;
        /// Write enable
        const WE  = 1 << 2;

        /// Read cycle
        const READ = Self::CYC.bits() | Self::STB.bits();
        /// Write cycle
        const WRITE = Self::CYC.bits() | Self::STB.bits() | Self::WE.bits();
    }
}

impl Default for BusControl {
    fn default() -> Self {
        BusControl::empty()
    }
}

/// Signals driven by the bus initiator during one system clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusSignals {
    /// Word address
    pub address: u32,
    /// Write data
    pub data: u32,
    /// Byte select mask, one bit per byte lane
    pub select: u8,
    /// Control lines
    pub control: BusControl,
}

impl BusSignals {
    /// Whether the initiator is requesting a transfer this cycle
    pub fn is_strobed(&self) -> bool {
        self.control.contains(BusControl::CYC | BusControl::STB)
    }

    /// Whether the current cycle is a write
    pub fn is_write(&self) -> bool {
        self.control.contains(BusControl::WE)
    }
}

/// Target response sampled by the initiator on the same clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusResponse {
    /// Acknowledge
    pub ack: bool,
    /// Read data, valid with `ack` on a read cycle
    pub data: u32,
}

impl BusResponse {
    /// An acknowledge carrying `data`
    pub fn ack(data: u32) -> Self {
        Self { ack: true, data }
    }
}

/// Bus target (the external collaborator behind the bridge)
///
/// `clock` is evaluated once per system clock edge with the signals the
/// initiator drives during that cycle. A target must acknowledge a strobed
/// cycle at most once; the initiator drops the strobe on the edge it sees
/// the acknowledge.
pub trait BusTarget {
    /// Evaluate one system clock
    fn clock(&mut self, signals: &BusSignals) -> BusResponse;

    /// External reset
    fn reset(&mut self) {}
}

impl<T: BusTarget + ?Sized> BusTarget for &mut T {
    fn clock(&mut self, signals: &BusSignals) -> BusResponse {
        (**self).clock(signals)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
