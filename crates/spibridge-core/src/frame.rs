//! Serial frame format
//!
//! A frame is `[direction:1][address:A][data:D]`, shifted MSB first while
//! select is held asserted. The direction bit is the frame MSB.

use crate::error::{Error, Result};

/// Widest frame that fits in the shift register
pub const MAX_FRAME_WIDTH: u32 = 32;

/// Transfer direction carried in the frame MSB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Bus write, committed when select deasserts
    Write = 0,
    /// Bus read, issued as soon as the address field is complete
    Read = 1,
}

impl Direction {
    /// Decode the direction bit
    pub fn from_bit(bit: bool) -> Self {
        if bit {
            Direction::Read
        } else {
            Direction::Write
        }
    }

    /// The wire value of this direction
    pub fn bit(self) -> bool {
        self == Direction::Read
    }
}

/// A single bus transaction as carried by one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transaction {
    /// Read or write
    pub direction: Direction,
    /// Word address on the bus
    pub address: u32,
    /// Write data, or read result once the bus has answered
    pub data: u32,
}

impl Transaction {
    /// A read of `address` (data field shifted as zeros)
    pub fn read(address: u32) -> Self {
        Self {
            direction: Direction::Read,
            address,
            data: 0,
        }
    }

    /// A write of `data` to `address`
    pub fn write(address: u32, data: u32) -> Self {
        Self {
            direction: Direction::Write,
            address,
            data,
        }
    }
}

/// Field widths of the serial frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameFormat {
    address_width: u32,
    data_width: u32,
}

impl Default for FrameFormat {
    fn default() -> Self {
        // 1 bit r/~w, 7 bit address, 16 bit data
        Self {
            address_width: 7,
            data_width: 16,
        }
    }
}

impl FrameFormat {
    /// Create a frame format, validating the field widths
    pub fn new(address_width: u32, data_width: u32) -> Result<Self> {
        let valid = address_width >= 1
            && data_width >= 1
            && 1 + address_width as u64 + data_width as u64 <= MAX_FRAME_WIDTH as u64;
        if !valid {
            return Err(Error::InvalidFrameFormat {
                address_width,
                data_width,
            });
        }
        Ok(Self {
            address_width,
            data_width,
        })
    }

    /// Address field width (A)
    pub fn address_width(&self) -> u32 {
        self.address_width
    }

    /// Data field width (D)
    pub fn data_width(&self) -> u32 {
        self.data_width
    }

    /// Total frame width, `1 + A + D`
    pub fn width(&self) -> u32 {
        1 + self.address_width + self.data_width
    }

    /// Bit count at which direction and address are complete (`A + 1`)
    pub fn decode_point(&self) -> u32 {
        self.address_width + 1
    }

    /// Number of bits the per-frame bit counter needs to hold `width()`
    pub fn counter_width(&self) -> u32 {
        u32::BITS - self.width().leading_zeros()
    }

    /// Mask covering the address field
    pub fn address_mask(&self) -> u32 {
        mask(self.address_width)
    }

    /// Mask covering the data field
    pub fn data_mask(&self) -> u32 {
        mask(self.data_width)
    }

    /// Mask covering a whole frame
    pub fn frame_mask(&self) -> u32 {
        mask(self.width())
    }

    /// Number of byte lanes on the data bus (width of the byte select mask)
    pub fn byte_lanes(&self) -> u32 {
        self.data_width.div_ceil(8)
    }

    /// Check that a transaction fits the field widths
    pub fn check(&self, tx: &Transaction) -> Result<()> {
        if tx.address & !self.address_mask() != 0 {
            return Err(Error::AddressOutOfRange(tx.address));
        }
        if tx.data & !self.data_mask() != 0 {
            return Err(Error::DataOutOfRange(tx.data));
        }
        Ok(())
    }

    /// Pack a transaction into frame bits (MSB is the first bit on the wire)
    pub fn encode(&self, tx: &Transaction) -> Result<u32> {
        self.check(tx)?;
        let dir = tx.direction.bit() as u32;
        Ok((dir << (self.width() - 1))
            | (tx.address << self.data_width)
            | tx.data)
    }

    /// Split frame bits into their fields
    pub fn decode(&self, frame: u32) -> Transaction {
        let frame = frame & self.frame_mask();
        Transaction {
            direction: Direction::from_bit(frame >> (self.width() - 1) & 1 != 0),
            address: (frame >> self.data_width) & self.address_mask(),
            data: frame & self.data_mask(),
        }
    }
}

/// Low `bits` bits set (`bits` may be 32)
pub(crate) fn mask(bits: u32) -> u32 {
    if bits >= u32::BITS {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}
