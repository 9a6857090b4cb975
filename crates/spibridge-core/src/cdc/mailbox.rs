//! Atomic single-slot mailboxes for running the two sides on separate threads

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use super::{BusLink, FrameEnd, ReadRequest, ReadResult, SerialLink, WriteCommit};
use crate::error::{Error, Result};

const EMPTY: u8 = 0;
const FULL: u8 = 1;
const FULL_COMMIT: u8 = 2;

/// Single-slot, overwrite-forbidden mailbox
///
/// One producer and one consumer. The producer stores the payload words and
/// then publishes a non-zero tag with release ordering; the consumer reads
/// the tag with acquire ordering, copies the words and frees the slot. A
/// publish into a full slot is refused, so the words are never rewritten
/// while the consumer may be reading them.
#[derive(Debug)]
pub struct Mailbox {
    state: AtomicU8,
    words: [AtomicU32; 2],
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    /// Create an empty mailbox
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            words: [AtomicU32::new(0), AtomicU32::new(0)],
        }
    }

    /// Publish `words` under the non-zero `tag`
    pub fn publish(&self, tag: u8, words: [u32; 2]) -> Result<()> {
        debug_assert_ne!(tag, EMPTY);
        if self.state.load(Ordering::Acquire) != EMPTY {
            return Err(Error::HandoffBusy);
        }
        self.words[0].store(words[0], Ordering::Relaxed);
        self.words[1].store(words[1], Ordering::Relaxed);
        self.state.store(tag, Ordering::Release);
        Ok(())
    }

    /// Take the slot contents, freeing it for the producer
    pub fn take(&self) -> Option<(u8, [u32; 2])> {
        let tag = self.state.load(Ordering::Acquire);
        if tag == EMPTY {
            return None;
        }
        let words = [
            self.words[0].load(Ordering::Relaxed),
            self.words[1].load(Ordering::Relaxed),
        ];
        self.state.store(EMPTY, Ordering::Release);
        Some((tag, words))
    }

    /// Whether an event is waiting
    pub fn is_full(&self) -> bool {
        self.state.load(Ordering::Acquire) != EMPTY
    }

    /// Whether the last published event has been consumed
    pub fn is_delivered(&self) -> bool {
        !self.is_full()
    }

    /// Drop any pending event
    pub fn clear(&self) {
        self.state.store(EMPTY, Ordering::Release);
    }
}

/// Handoff built from mailboxes, shared by reference between two threads
///
/// Both link traits are implemented for `&AtomicHandoff`, so the serial
/// thread and the bus thread each hold a shared reference and never need a
/// lock.
#[derive(Debug, Default)]
pub struct AtomicHandoff {
    selected: AtomicBool,
    request: Mailbox,
    receipt: Mailbox,
    frame_end: Mailbox,
    result: Mailbox,
}

impl AtomicHandoff {
    /// Create an idle handoff
    pub const fn new() -> Self {
        Self {
            selected: AtomicBool::new(false),
            request: Mailbox::new(),
            receipt: Mailbox::new(),
            frame_end: Mailbox::new(),
            result: Mailbox::new(),
        }
    }

    /// Whether a read result is waiting for the serial side
    pub fn result_ready(&self) -> bool {
        self.result.is_full()
    }

    /// Whether anything sent towards the bus side has not been consumed yet
    pub fn bus_in_flight(&self) -> bool {
        self.request.is_full() || self.receipt.is_full() || self.frame_end.is_full()
    }

    /// Drop every pending event and deassert select
    pub fn reset(&self) {
        self.selected.store(false, Ordering::Release);
        self.request.clear();
        self.receipt.clear();
        self.frame_end.clear();
        self.result.clear();
    }
}

impl SerialLink for &AtomicHandoff {
    fn set_selected(&mut self, selected: bool) {
        self.selected.store(selected, Ordering::Release);
    }

    fn request_read(&mut self, request: ReadRequest) -> Result<()> {
        self.request
            .publish(FULL, [request.address, request.tag as u32])
    }

    fn take_result(&mut self) -> Option<ReadResult> {
        self.result.take().map(|(_, [data, tag])| ReadResult {
            data,
            tag: tag as u8,
        })
    }

    fn confirm_receipt(&mut self) -> Result<()> {
        self.receipt.publish(FULL, [0, 0])
    }

    fn end_frame(&mut self, end: FrameEnd) -> Result<()> {
        match end.commit {
            Some(commit) => self
                .frame_end
                .publish(FULL_COMMIT, [commit.address, commit.data]),
            None => self.frame_end.publish(FULL, [0, 0]),
        }
    }
}

impl BusLink for &AtomicHandoff {
    fn selected(&self) -> bool {
        self.selected.load(Ordering::Acquire)
    }

    fn event_pending(&self) -> bool {
        self.request.is_full() || self.frame_end.is_full()
    }

    fn take_request(&mut self) -> Option<ReadRequest> {
        self.request.take().map(|(_, [address, tag])| ReadRequest {
            address,
            tag: tag as u8,
        })
    }

    fn take_receipt(&mut self) -> bool {
        self.receipt.take().is_some()
    }

    fn take_frame_end(&mut self) -> Option<FrameEnd> {
        self.frame_end.take().map(|(tag, [address, data])| FrameEnd {
            commit: (tag == FULL_COMMIT).then_some(WriteCommit { address, data }),
        })
    }

    fn publish_result(&mut self, result: ReadResult) -> Result<()> {
        self.result
            .publish(FULL, [result.data, result.tag as u32])
    }
}
