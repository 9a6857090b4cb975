//! Frame Shift Register

use crate::frame::{mask, FrameFormat};

/// Inbound frame buffer plus the per-frame bit counter
///
/// Bits enter at the LSB, so after `width()` edges the first bit on the wire
/// is the buffer MSB. The buffer is never cleared: it keeps whatever was
/// shifted in last and only shifting changes it.
#[derive(Debug, Clone)]
pub struct FrameShiftRegister {
    format: FrameFormat,
    buffer: u32,
    count: u32,
    overrun: bool,
}

impl FrameShiftRegister {
    /// Create an empty shift register for `format`
    pub fn new(format: FrameFormat) -> Self {
        Self {
            format,
            buffer: 0,
            count: 0,
            overrun: false,
        }
    }

    /// Shift one inbound bit in and advance the counter
    ///
    /// The counter is `counter_width()` bits wide and wraps; clocking past
    /// the frame width marks the frame as overrun.
    pub fn shift_in(&mut self, bit: bool) {
        self.buffer = ((self.buffer << 1) | bit as u32) & self.format.frame_mask();
        if self.count >= self.format.width() {
            self.overrun = true;
        }
        self.count = (self.count + 1) & mask(self.format.counter_width());
    }

    /// Raw frame buffer
    pub fn buffer(&self) -> u32 {
        self.buffer
    }

    /// Edges counted since select asserted (modulo the counter width)
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Whether more than `width()` edges arrived in this frame
    pub fn overrun(&self) -> bool {
        self.overrun
    }

    /// Whether the direction bit and address field have just completed
    pub fn at_decode_point(&self) -> bool {
        !self.overrun && self.count == self.format.decode_point()
    }

    /// Bit the echo path drives out: the buffer MSB
    pub fn echo_bit(&self) -> bool {
        (self.buffer >> (self.format.width() - 1)) & 1 != 0
    }

    /// Clear the counter at the end of a frame (the buffer is kept)
    pub fn end_frame(&mut self) {
        self.count = 0;
        self.overrun = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_msb_first() {
        let fmt = FrameFormat::default();
        let mut sr = FrameShiftRegister::new(fmt);
        let frame = 0x90_0000u32;
        for i in (0..fmt.width()).rev() {
            sr.shift_in((frame >> i) & 1 != 0);
            if sr.count() == fmt.decode_point() {
                assert!(sr.at_decode_point());
                assert_eq!(sr.buffer(), 0x90);
            }
        }
        assert_eq!(sr.buffer(), frame);
        assert_eq!(sr.count(), 24);
        assert!(!sr.overrun());
    }

    #[test]
    fn test_overrun_and_residual_buffer() {
        let fmt = FrameFormat::new(7, 8).unwrap();
        let mut sr = FrameShiftRegister::new(fmt);
        for _ in 0..fmt.width() {
            sr.shift_in(true);
        }
        assert!(!sr.overrun());
        sr.shift_in(false);
        assert!(sr.overrun());
        assert_eq!(sr.count(), 17);

        // the counter wraps, but a wrapped count never decodes
        for _ in 0..(32 - 17 + fmt.decode_point()) {
            sr.shift_in(false);
        }
        assert_eq!(sr.count(), fmt.decode_point());
        assert!(!sr.at_decode_point());

        sr.end_frame();
        assert_eq!(sr.count(), 0);
        assert!(!sr.overrun());
        assert_eq!(sr.buffer(), 0);
    }
}
