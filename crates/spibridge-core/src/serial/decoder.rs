//! Frame Decoder and outbound multiplexer

use crate::cdc::{ReadRequest, ReadResult};
use crate::frame::{Direction, FrameFormat};

/// Decoded direction and address of the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// Direction bit
    pub direction: Direction,
    /// Address field
    pub address: u32,
}

/// Splits the frame at the decode point and owns the outbound data path
///
/// Until a matching read result arrives, the serial output echoes the frame
/// buffer. Accepting the result switches the multiplexer to the data
/// register, once per frame.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    format: FrameFormat,
    decoded: Option<Decoded>,
    next_tag: u8,
    outstanding: Option<u8>,
    switch_bit: Option<u32>,
    tx_data: u32,
}

impl FrameDecoder {
    /// Create a decoder for `format`
    pub fn new(format: FrameFormat) -> Self {
        Self {
            format,
            decoded: None,
            next_tag: 0,
            outstanding: None,
            switch_bit: None,
            tx_data: 0,
        }
    }

    /// Decode direction and address from a buffer holding exactly `A + 1` bits
    ///
    /// Returns the read request to raise for a READ frame.
    pub fn decode(&mut self, buffer: u32) -> Option<ReadRequest> {
        let direction = Direction::from_bit((buffer >> self.format.address_width()) & 1 != 0);
        let address = buffer & self.format.address_mask();
        self.decoded = Some(Decoded { direction, address });

        if direction != Direction::Read {
            return None;
        }
        self.next_tag = self.next_tag.wrapping_add(1);
        self.outstanding = Some(self.next_tag);
        Some(ReadRequest {
            address,
            tag: self.next_tag,
        })
    }

    /// Direction and address of the current frame, once decoded
    pub fn decoded(&self) -> Option<Decoded> {
        self.decoded
    }

    /// Forget the outstanding request (it could not be handed off)
    pub fn cancel_request(&mut self) {
        self.outstanding = None;
    }

    /// Whether a read was requested in this frame and its data has not arrived
    pub fn read_outstanding(&self) -> bool {
        self.outstanding.is_some() && self.switch_bit.is_none()
    }

    /// Offer a result from the bus side at bit position `bit`
    ///
    /// A result is accepted only if it answers this frame's request and the
    /// output has not switched yet. Returns whether it was accepted.
    pub fn offer(&mut self, result: ReadResult, bit: u32) -> bool {
        if self.outstanding != Some(result.tag) || self.switch_bit.is_some() {
            return false;
        }
        self.tx_data = result.data & self.format.data_mask();
        self.switch_bit = Some(bit);
        true
    }

    /// Bit position at which the output switched to read data, if it did
    pub fn switch_bit(&self) -> Option<u32> {
        self.switch_bit
    }

    /// Advance the data register after a receive edge
    pub fn shift(&mut self) {
        if self.switch_bit.is_some() {
            self.tx_data = (self.tx_data << 1) & self.format.data_mask();
        }
    }

    /// Value for the serial output, given the echo bit of the frame buffer
    pub fn output(&self, echo: bool) -> bool {
        if self.switch_bit.is_some() {
            (self.tx_data >> (self.format.data_width() - 1)) & 1 != 0
        } else {
            echo
        }
    }

    /// Clear per-frame state (the tag counter keeps running)
    pub fn end_frame(&mut self) {
        self.decoded = None;
        self.outstanding = None;
        self.switch_bit = None;
        self.tx_data = 0;
    }
}
