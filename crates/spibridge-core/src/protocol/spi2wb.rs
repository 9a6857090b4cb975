//! Register access through the bridge's serial frames
//!
//! One frame carries one transaction. Writes are committed by the bridge
//! when select deasserts; reads return the data in the last `D` bits of the
//! same frame, provided the bus answered before the first data bit.

use crate::error::Result;
use crate::frame::{Direction, FrameFormat, Transaction};
use crate::programmer::bitbang::single;
use crate::programmer::BitbangSpiMaster;

/// Clock the first `bits` bits of a frame, returning what came back on MISO
///
/// Fewer than `width()` bits produce a short or truncated frame, more
/// produce an overrun (extra bits are zeros). The turnaround hook runs
/// before the first data bit of a read.
pub fn transfer_partial<M: BitbangSpiMaster + ?Sized>(
    master: &mut M,
    format: &FrameFormat,
    tx: &Transaction,
    bits: u32,
) -> Result<u32> {
    let frame = format.encode(tx)?;
    let width = format.width();

    master.set_cs(true);
    master.half_period_delay();

    let mut response = 0u32;
    for i in 0..bits {
        if tx.direction == Direction::Read && i == format.decode_point() {
            master.turnaround();
        }
        let bit = i < width && (frame >> (width - 1 - i)) & 1 != 0;
        response = (response << 1) | single::transfer_bit(master, bit) as u32;
    }

    master.set_sck(false);
    master.half_period_delay();
    master.set_cs(false);
    master.half_period_delay();

    log::trace!("frame 0x{:06X} ({} bits) -> 0x{:06X}", frame, bits, response);
    Ok(response)
}

/// Clock one complete frame
pub fn transfer_frame<M: BitbangSpiMaster + ?Sized>(
    master: &mut M,
    format: &FrameFormat,
    tx: &Transaction,
) -> Result<u32> {
    transfer_partial(master, format, tx, format.width())
}

/// Write `data` to the register at `address`
pub fn write_register<M: BitbangSpiMaster + ?Sized>(
    master: &mut M,
    format: &FrameFormat,
    address: u32,
    data: u32,
) -> Result<()> {
    transfer_frame(master, format, &Transaction::write(address, data))?;
    Ok(())
}

/// Read the register at `address`
pub fn read_register<M: BitbangSpiMaster + ?Sized>(
    master: &mut M,
    format: &FrameFormat,
    address: u32,
) -> Result<u32> {
    let response = transfer_frame(master, format, &Transaction::read(address))?;
    Ok(response & format.data_mask())
}

/// Pulse select without any clock edge
pub fn select_glitch<M: BitbangSpiMaster + ?Sized>(master: &mut M) {
    master.set_cs(true);
    master.half_period_delay();
    master.set_cs(false);
    master.half_period_delay();
}
