//! Serial side of the bridge
//!
//! Everything here runs in the two serial timing contexts: the receive
//! context ([`SerialSide::rising_edge`]) and the transmit/latch context
//! ([`SerialSide::falling_edge`] and [`SerialSide::deselect`]). The bus side
//! is only reached through a [`SerialLink`].

mod decoder;
mod latch;
mod shift;

pub use decoder::{Decoded, FrameDecoder};
pub use latch::OutputLatch;
pub use shift::FrameShiftRegister;

use crate::cdc::{FrameEnd, SerialLink, WriteCommit};
use crate::frame::{Direction, FrameFormat};

/// How a frame ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Select pulsed without any clock edge; nothing was latched
    Glitch,
    /// Select deasserted before the address field completed
    Short {
        /// Edges seen
        bits: u32,
    },
    /// A WRITE frame that was truncated after its address, or any overrun frame
    Malformed {
        /// Edges seen (modulo the counter width)
        bits: u32,
    },
    /// A READ frame ended
    Read {
        /// Decoded address
        address: u32,
        /// Whether the read data was shifted out in this frame
        completed: bool,
    },
    /// A complete WRITE frame was committed to the bus side
    Write {
        /// Decoded address
        address: u32,
        /// Data field
        data: u32,
    },
}

/// Serial-side counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialStats {
    /// Frames with at least one clock edge
    pub frames: u64,
    /// Select pulses without clock edges
    pub glitches: u64,
    /// Frames ended before the address was complete
    pub short_frames: u64,
    /// Truncated WRITE frames and overrun frames
    pub malformed_frames: u64,
    /// Read requests raised
    pub read_requests: u64,
    /// Read results accepted and shifted out
    pub results_accepted: u64,
    /// Results dropped because they answered an earlier frame
    pub stale_results: u64,
    /// Reads whose frame ended before the data arrived
    pub abandoned_reads: u64,
    /// Write commits sent to the bus side
    pub write_commits: u64,
    /// Events the handoff refused
    pub handoff_faults: u64,
}

/// Frame Shift Register, Frame Decoder and Output Latch of one bridge
#[derive(Debug, Clone)]
pub struct SerialSide {
    format: FrameFormat,
    selected: bool,
    shift: FrameShiftRegister,
    decoder: FrameDecoder,
    latch: OutputLatch,
    sdo: bool,
    last_switch_bit: Option<u32>,
    stats: SerialStats,
}

impl SerialSide {
    /// Create the serial side for `format`
    pub fn new(format: FrameFormat) -> Self {
        Self {
            format,
            selected: false,
            shift: FrameShiftRegister::new(format),
            decoder: FrameDecoder::new(format),
            latch: OutputLatch::new(),
            sdo: false,
            last_switch_bit: None,
            stats: SerialStats::default(),
        }
    }

    /// Select asserted: a new frame begins
    pub fn select<L: SerialLink>(&mut self, link: &mut L) {
        if self.selected {
            return;
        }
        self.selected = true;
        self.last_switch_bit = None;
        link.set_selected(true);
        log::trace!("select asserted");
    }

    /// Receive context: serial clock rising edge with `sdi` on the input line
    pub fn rising_edge<L: SerialLink>(&mut self, link: &mut L, sdi: bool) {
        if !self.selected {
            return;
        }
        self.latch.arm();
        self.shift.shift_in(sdi);
        self.decoder.shift();
        log::trace!("rx bit {} = {}", self.shift.count(), sdi as u8);

        if !self.shift.at_decode_point() {
            return;
        }
        if let Some(request) = self.decoder.decode(self.shift.buffer()) {
            self.stats.read_requests += 1;
            log::debug!(
                "read request addr=0x{:02X} tag={}",
                request.address,
                request.tag
            );
            if let Err(e) = link.request_read(request) {
                log::error!("read request for 0x{:02X} lost: {}", request.address, e);
                self.stats.handoff_faults += 1;
                self.decoder.cancel_request();
            }
        }
    }

    /// Transmit context: serial clock falling edge
    ///
    /// Takes a read result if one arrived and updates the output line.
    pub fn falling_edge<L: SerialLink>(&mut self, link: &mut L) {
        if !self.selected {
            return;
        }
        if let Some(result) = link.take_result() {
            let bit = self.shift.count();
            if self.decoder.offer(result, bit) {
                self.stats.results_accepted += 1;
                self.last_switch_bit = Some(bit);
                log::debug!("read data 0x{:X} switched in at bit {}", result.data, bit);
                if let Err(e) = link.confirm_receipt() {
                    log::error!("receipt confirmation lost: {}", e);
                    self.stats.handoff_faults += 1;
                }
            } else {
                self.stats.stale_results += 1;
                log::warn!(
                    "dropping stale read result 0x{:X} (tag {})",
                    result.data,
                    result.tag
                );
            }
        }
        self.sdo = self.decoder.output(self.shift.echo_bit());
    }

    /// Latch context: select deasserted
    pub fn deselect<L: SerialLink>(&mut self, link: &mut L) -> Option<FrameOutcome> {
        if !self.selected {
            return None;
        }
        self.selected = false;

        if !self.latch.deselect(self.shift.buffer()) {
            self.stats.glitches += 1;
            log::debug!("select glitch without clock edges ignored");
            link.set_selected(false);
            return Some(FrameOutcome::Glitch);
        }
        self.stats.frames += 1;

        let (outcome, commit) = self.classify(link);
        if let Err(e) = link.end_frame(FrameEnd { commit }) {
            log::error!("frame end lost: {}", e);
            self.stats.handoff_faults += 1;
        }
        link.set_selected(false);

        self.shift.end_frame();
        self.decoder.end_frame();
        Some(outcome)
    }

    fn classify<L: SerialLink>(&mut self, link: &mut L) -> (FrameOutcome, Option<WriteCommit>) {
        let bits = self.shift.count();
        if self.shift.overrun() {
            self.stats.malformed_frames += 1;
            log::warn!("discarding overlong frame");
            return (FrameOutcome::Malformed { bits }, None);
        }
        let Some(decoded) = self.decoder.decoded() else {
            self.stats.short_frames += 1;
            log::warn!("discarding short frame ({} bits)", bits);
            return (FrameOutcome::Short { bits }, None);
        };

        match decoded.direction {
            Direction::Read => {
                let completed = self.decoder.switch_bit().is_some();
                if self.decoder.read_outstanding() {
                    // release the bus side; the late result is dropped by tag
                    self.stats.abandoned_reads += 1;
                    log::warn!("read of 0x{:02X} ended before data arrived", decoded.address);
                    if let Err(e) = link.confirm_receipt() {
                        log::error!("receipt confirmation lost: {}", e);
                        self.stats.handoff_faults += 1;
                    }
                }
                log::debug!("read frame 0x{:02X} done", decoded.address);
                (
                    FrameOutcome::Read {
                        address: decoded.address,
                        completed,
                    },
                    None,
                )
            }
            Direction::Write if bits == self.format.width() => {
                let data = self.latch.value() & self.format.data_mask();
                self.stats.write_commits += 1;
                log::debug!("write frame 0x{:02X} <- 0x{:X}", decoded.address, data);
                let commit = WriteCommit {
                    address: decoded.address,
                    data,
                };
                (
                    FrameOutcome::Write {
                        address: decoded.address,
                        data,
                    },
                    Some(commit),
                )
            }
            Direction::Write => {
                self.stats.malformed_frames += 1;
                log::warn!(
                    "discarding truncated write to 0x{:02X} ({} bits)",
                    decoded.address,
                    bits
                );
                (FrameOutcome::Malformed { bits }, None)
            }
        }
    }

    /// Current serial output level
    pub fn sdo(&self) -> bool {
        self.sdo
    }

    /// Whether select is asserted
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Bit counter value
    pub fn bit_count(&self) -> u32 {
        self.shift.count()
    }

    /// Raw frame buffer
    pub fn buffer(&self) -> u32 {
        self.shift.buffer()
    }

    /// Last latched frame
    pub fn latched(&self) -> u32 {
        self.latch.value()
    }

    /// Bit position of the output switch in the current or last frame
    pub fn last_switch_bit(&self) -> Option<u32> {
        self.last_switch_bit
    }

    /// Serial-side counters
    pub fn stats(&self) -> SerialStats {
        self.stats
    }

    /// External reset: counters, flags and the latch return to reset values
    pub fn reset(&mut self) {
        self.selected = false;
        self.sdo = false;
        self.last_switch_bit = None;
        self.shift.end_frame();
        self.decoder.end_frame();
        self.latch.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdc::{ReadRequest, ReadResult};
    use crate::error::Result;
    use crate::frame::Transaction;

    /// Link that records everything and answers reads immediately
    #[derive(Default)]
    struct Loopback {
        selected: bool,
        requests: [Option<ReadRequest>; 4],
        n_requests: usize,
        answer: Option<ReadResult>,
        receipts: u32,
        ends: [Option<FrameEnd>; 4],
        n_ends: usize,
    }

    impl SerialLink for Loopback {
        fn set_selected(&mut self, selected: bool) {
            self.selected = selected;
        }
        fn request_read(&mut self, request: ReadRequest) -> Result<()> {
            self.requests[self.n_requests] = Some(request);
            self.n_requests += 1;
            self.answer = Some(ReadResult {
                data: 0xBEEF,
                tag: request.tag,
            });
            Ok(())
        }
        fn take_result(&mut self) -> Option<ReadResult> {
            self.answer.take()
        }
        fn confirm_receipt(&mut self) -> Result<()> {
            self.receipts += 1;
            Ok(())
        }
        fn end_frame(&mut self, end: FrameEnd) -> Result<()> {
            self.ends[self.n_ends] = Some(end);
            self.n_ends += 1;
            Ok(())
        }
    }

    fn clock_frame(side: &mut SerialSide, link: &mut Loopback, frame: u32, bits: u32) -> u32 {
        let width = side.format.width();
        let mut response = 0;
        side.select(link);
        for i in 0..bits {
            side.falling_edge(link);
            let bit = (frame >> (width - 1 - i)) & 1 != 0;
            side.rising_edge(link, bit);
            response = (response << 1) | side.sdo() as u32;
        }
        response
    }

    #[test]
    fn test_write_frame_commits() {
        let fmt = FrameFormat::default();
        let mut side = SerialSide::new(fmt);
        let mut link = Loopback::default();
        let frame = fmt.encode(&Transaction::write(0x10, 0xBEEF)).unwrap();
        clock_frame(&mut side, &mut link, frame, fmt.width());
        assert!(link.selected);
        let outcome = side.deselect(&mut link);

        assert_eq!(
            outcome,
            Some(FrameOutcome::Write {
                address: 0x10,
                data: 0xBEEF
            })
        );
        assert_eq!(side.latched(), frame);
        assert_eq!(
            link.ends[0].unwrap().commit,
            Some(WriteCommit {
                address: 0x10,
                data: 0xBEEF
            })
        );
        assert_eq!(link.n_requests, 0);
        assert_eq!(side.bit_count(), 0);
        assert!(!link.selected);
    }

    #[test]
    fn test_read_data_starts_at_decode_point() {
        let fmt = FrameFormat::default();
        let mut side = SerialSide::new(fmt);
        let mut link = Loopback::default();
        let frame = fmt.encode(&Transaction::read(0x10)).unwrap();
        let response = clock_frame(&mut side, &mut link, frame, fmt.width());

        assert_eq!(side.last_switch_bit(), Some(fmt.decode_point()));
        assert_eq!(response & fmt.data_mask(), 0xBEEF);
        assert_eq!(link.receipts, 1);
        assert_eq!(
            side.deselect(&mut link),
            Some(FrameOutcome::Read {
                address: 0x10,
                completed: true
            })
        );
        assert_eq!(link.ends[0].unwrap().commit, None);
    }

    #[test]
    fn test_short_frame_discarded() {
        let fmt = FrameFormat::default();
        let mut side = SerialSide::new(fmt);
        let mut link = Loopback::default();
        clock_frame(&mut side, &mut link, 0x10_BEEF, 5);
        assert_eq!(side.deselect(&mut link), Some(FrameOutcome::Short { bits: 5 }));
        assert_eq!(link.ends[0].unwrap().commit, None);
        assert_eq!(side.bit_count(), 0);
        assert_eq!(side.stats().short_frames, 1);
    }

    #[test]
    fn test_truncated_write_is_malformed() {
        let fmt = FrameFormat::default();
        let mut side = SerialSide::new(fmt);
        let mut link = Loopback::default();
        clock_frame(&mut side, &mut link, 0x10_BEEF, 12);
        assert_eq!(
            side.deselect(&mut link),
            Some(FrameOutcome::Malformed { bits: 12 })
        );
        assert_eq!(link.ends[0].unwrap().commit, None);
    }

    #[test]
    fn test_glitch_produces_no_latch_or_frame_end() {
        let fmt = FrameFormat::default();
        let mut side = SerialSide::new(fmt);
        let mut link = Loopback::default();
        clock_frame(&mut side, &mut link, 0x10_BEEF, fmt.width());
        side.deselect(&mut link);

        side.select(&mut link);
        assert_eq!(side.deselect(&mut link), Some(FrameOutcome::Glitch));
        assert_eq!(side.latched(), 0x10_BEEF);
        assert_eq!(link.n_ends, 1);
        assert_eq!(side.stats().glitches, 1);
    }

    #[test]
    fn test_abandoned_read_releases_bus_side() {
        let fmt = FrameFormat::default();
        let mut side = SerialSide::new(fmt);
        let mut link = Loopback::default();
        let frame = fmt.encode(&Transaction::read(0x10)).unwrap();
        clock_frame(&mut side, &mut link, frame, fmt.decode_point());
        // the result has not been looked at yet
        assert_eq!(
            side.deselect(&mut link),
            Some(FrameOutcome::Read {
                address: 0x10,
                completed: false
            })
        );
        assert_eq!(link.receipts, 1);

        // it shows up during the next frame and is dropped
        clock_frame(&mut side, &mut link, 0x10_BEEF, 2);
        assert_eq!(side.stats().stale_results, 1);
        assert_eq!(side.last_switch_bit(), None);
    }
}
