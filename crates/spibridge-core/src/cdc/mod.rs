//! Cross-domain handoff between the serial and bus timing contexts
//!
//! The serial side (receive and transmit/latch contexts) and the bus side
//! never touch each other's state. Everything that crosses the boundary goes
//! through one of the two link traits defined here:
//!
//! - [`SerialLink`] is the view from the serial clock edges
//! - [`BusLink`] is the view from the system clock
//!
//! Two implementations exist:
//!
//! - [`ClockedHandoff`] models the crossing at register level: event
//!   sequence counters and payload registers sampled through
//!   [`Synchronizer`] chains clocked by the destination.
//! - [`AtomicHandoff`] backs each channel with a single-slot
//!   [`Mailbox`] so the two sides can run on separate threads.
//!
//! ## Channels
//!
//! | Direction   | Channel    | Payload |
//! |-------------|------------|---------|
//! | serial→bus  | select     | level |
//! | serial→bus  | request    | [`ReadRequest`] |
//! | serial→bus  | receipt    | none |
//! | serial→bus  | frame end  | [`FrameEnd`] |
//! | bus→serial  | result     | [`ReadResult`] |
//!
//! Frames can end faster than the bus side retires them, so the clocked
//! channels queue up to [`CHANNEL_DEPTH`] events each. A send into a full
//! channel fails with [`Error::HandoffBusy`](crate::Error::HandoffBusy) and
//! the serial side counts it as a handoff fault.

mod clocked;
mod mailbox;
mod pulse;
mod sync;

pub use clocked::ClockedHandoff;
pub use mailbox::{AtomicHandoff, Mailbox};
pub use pulse::{PulseChannel, CHANNEL_DEPTH};
pub use sync::{Synchronizer, MAX_SYNC_STAGES};

use crate::error::Result;

/// A read request raised once the address field of a READ frame is complete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadRequest {
    /// Decoded word address
    pub address: u32,
    /// Per-frame tag, echoed back in the matching [`ReadResult`]
    pub tag: u8,
}

/// Read data returned by the bus side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadResult {
    /// Word read from the bus
    pub data: u32,
    /// Tag of the request this answers
    pub tag: u8,
}

/// A write latched at the end of a complete WRITE frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCommit {
    /// Decoded word address
    pub address: u32,
    /// Data field of the latched frame
    pub data: u32,
}

/// Notification that select deasserted after at least one clock edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameEnd {
    /// Write to issue, if the frame was a complete WRITE frame
    pub commit: Option<WriteCommit>,
}

/// Serial-side view of the handoff
pub trait SerialLink {
    /// Publish the current select level
    fn set_selected(&mut self, selected: bool);

    /// Raise the request-pending event
    fn request_read(&mut self, request: ReadRequest) -> Result<()>;

    /// Take the ack-pending event together with its data word, if one arrived
    fn take_result(&mut self) -> Option<ReadResult>;

    /// Acknowledge receipt of a result (or abandonment of a read)
    fn confirm_receipt(&mut self) -> Result<()>;

    /// Report the end of a frame
    fn end_frame(&mut self, end: FrameEnd) -> Result<()>;
}

/// Bus-side view of the handoff
pub trait BusLink {
    /// Select level as seen from the bus side
    fn selected(&self) -> bool;

    /// Whether a request or frame end is waiting to be taken
    fn event_pending(&self) -> bool;

    /// Take the request-pending event
    fn take_request(&mut self) -> Option<ReadRequest>;

    /// Take the serial side's acknowledge-of-receipt event
    fn take_receipt(&mut self) -> bool;

    /// Take the frame end event
    fn take_frame_end(&mut self) -> Option<FrameEnd>;

    /// Publish read data and raise ack-pending
    ///
    /// Fails with [`Error::HandoffBusy`](crate::Error::HandoffBusy) when the
    /// result channel has no room; the caller retries.
    fn publish_result(&mut self, result: ReadResult) -> Result<()>;
}
