//! Bitbang SPI master trait for driving the bridge from the host side
//!
//! The bridge is clocked like a plain SPI mode 0 slave: the host changes
//! MOSI while SCK is low and samples MISO after the rising edge. Anything
//! that can toggle four lines can be a master: GPIO pins, an FPGA test
//! bench or the simulators in `spibridge-sim`.

/// Trait for low-level bitbang SPI operations
///
/// This trait provides the minimal set of operations needed for bitbanging
/// the bridge. Implementations can optionally combine line changes.
pub trait BitbangSpiMaster {
    /// Set chip select (CS is active low, so `active=true` means CS=0)
    fn set_cs(&mut self, active: bool);

    /// Set clock line value
    fn set_sck(&mut self, high: bool);

    /// Set MOSI line value
    fn set_mosi(&mut self, high: bool);

    /// Get MISO line value
    fn get_miso(&self) -> bool;

    /// Delay for half a clock period
    fn half_period_delay(&mut self);

    /// Optional: Set SCK and MOSI atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `set_mosi`.
    fn set_sck_set_mosi(&mut self, sck: bool, mosi: bool) {
        self.set_sck(sck);
        self.set_mosi(mosi);
    }

    /// Optional: Set SCK and get MISO atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `get_miso`.
    fn set_sck_get_miso(&mut self, sck: bool) -> bool {
        self.set_sck(sck);
        self.get_miso()
    }

    /// Optional: Stretch the clock before the first data bit of a read
    ///
    /// Called with SCK high right after the last address bit. Masters that
    /// know the bus side is slow can wait here so the read data is ready by
    /// the next falling edge.
    fn turnaround(&mut self) {}
}

/// Bitbang helper functions for single-wire I/O
///
/// These are standalone functions that can be used by any `BitbangSpiMaster`
/// implementation.
pub mod single {
    use super::BitbangSpiMaster;

    /// Clock one bit out and one bit in (SPI mode 0)
    pub fn transfer_bit<M: BitbangSpiMaster + ?Sized>(master: &mut M, bit: bool) -> bool {
        master.set_sck_set_mosi(false, bit);
        master.half_period_delay();
        let miso = master.set_sck_get_miso(true);
        master.half_period_delay();
        miso
    }

    /// Clock the low `count` bits of `bits` out MSB first, returning the bits read
    pub fn transfer_bits<M: BitbangSpiMaster + ?Sized>(
        master: &mut M,
        bits: u32,
        count: u32,
    ) -> u32 {
        let mut read = 0u32;
        for i in (0..count).rev() {
            let bit = (bits >> i) & 1 != 0;
            read = (read << 1) | transfer_bit(master, bit) as u32;
        }
        read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Loops MOSI back to MISO on the rising edge
    #[derive(Default)]
    struct Loop {
        sck: bool,
        mosi: bool,
        miso: bool,
        delays: usize,
    }

    impl BitbangSpiMaster for Loop {
        fn set_cs(&mut self, _active: bool) {}
        fn set_sck(&mut self, high: bool) {
            if high && !self.sck {
                self.miso = self.mosi;
            }
            self.sck = high;
        }
        fn set_mosi(&mut self, high: bool) {
            self.mosi = high;
        }
        fn get_miso(&self) -> bool {
            self.miso
        }
        fn half_period_delay(&mut self) {
            self.delays += 1;
        }
    }

    #[test]
    fn test_transfer_bits_msb_first() {
        let mut master = Loop::default();
        assert_eq!(single::transfer_bits(&mut master, 0b1011_0010, 8), 0b1011_0010);
        assert_eq!(master.delays, 16);
    }
}
