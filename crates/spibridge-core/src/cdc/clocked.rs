//! Register-level handoff for the clocked bridge model

use super::{
    BusLink, FrameEnd, PulseChannel, ReadRequest, ReadResult, SerialLink, Synchronizer,
};
use crate::error::Result;

/// Cycle-level crossing between the serial clock and the system clock
///
/// serial→bus channels are sampled by [`clock_bus`](Self::clock_bus) on
/// every system clock edge. The bus→serial result channel is sampled by
/// [`clock_serial`](Self::clock_serial) on every serial receive edge; the
/// serial clock only runs while a frame is selected, so its depth is
/// configured separately.
#[derive(Debug, Clone)]
pub struct ClockedHandoff {
    select: bool,
    select_sync: Synchronizer<bool>,
    request: PulseChannel<ReadRequest>,
    receipt: PulseChannel<()>,
    frame_end: PulseChannel<FrameEnd>,
    result: PulseChannel<ReadResult>,
}

impl ClockedHandoff {
    /// Create a handoff with the given synchronizer depths
    pub fn new(bus_stages: usize, serial_stages: usize) -> Result<Self> {
        Ok(Self {
            select: false,
            select_sync: Synchronizer::new(bus_stages)?,
            request: PulseChannel::new(bus_stages)?,
            receipt: PulseChannel::new(bus_stages)?,
            frame_end: PulseChannel::new(bus_stages)?,
            result: PulseChannel::new(serial_stages)?,
        })
    }

    /// System clock edge: advance the bus-side synchronizers
    pub fn clock_bus(&mut self) {
        self.select_sync.clock(self.select);
        self.request.clock();
        self.receipt.clock();
        self.frame_end.clock();
    }

    /// Serial receive edge: advance the serial-side synchronizer
    pub fn clock_serial(&mut self) {
        self.result.clock();
    }

    /// Whether anything sent towards the bus side has not been consumed yet
    pub fn bus_in_flight(&self) -> bool {
        self.select_sync.output(self.select) != self.select
            || self.request.in_flight()
            || self.receipt.in_flight()
            || self.frame_end.in_flight()
    }

    /// Whether a read result is waiting on the serial side
    pub fn result_in_flight(&self) -> bool {
        self.result.in_flight()
    }

    /// Return every register to its reset value
    pub fn reset(&mut self) {
        self.select = false;
        self.select_sync.reset();
        self.request.reset();
        self.receipt.reset();
        self.frame_end.reset();
        self.result.reset();
    }
}

impl SerialLink for ClockedHandoff {
    fn set_selected(&mut self, selected: bool) {
        self.select = selected;
    }

    fn request_read(&mut self, request: ReadRequest) -> Result<()> {
        self.request.fire(request)
    }

    fn take_result(&mut self) -> Option<ReadResult> {
        self.result.take()
    }

    fn confirm_receipt(&mut self) -> Result<()> {
        self.receipt.fire(())
    }

    fn end_frame(&mut self, end: FrameEnd) -> Result<()> {
        self.frame_end.fire(end)
    }
}

impl BusLink for ClockedHandoff {
    fn selected(&self) -> bool {
        self.select_sync.output(self.select)
    }

    fn event_pending(&self) -> bool {
        self.request.pending() || self.frame_end.pending()
    }

    fn take_request(&mut self) -> Option<ReadRequest> {
        self.request.take()
    }

    fn take_receipt(&mut self) -> bool {
        self.receipt.take().is_some()
    }

    fn take_frame_end(&mut self) -> Option<FrameEnd> {
        self.frame_end.take()
    }

    fn publish_result(&mut self, result: ReadResult) -> Result<()> {
        self.result.fire(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdc::{WriteCommit, CHANNEL_DEPTH};
    use crate::error::Error;

    #[test]
    fn test_select_and_frame_end_arrive_together() {
        let mut h = ClockedHandoff::new(2, 0).unwrap();
        h.set_selected(true);
        h.clock_bus();
        h.clock_bus();
        assert!(BusLink::selected(&h));

        let commit = WriteCommit {
            address: 0x10,
            data: 0xBEEF,
        };
        h.end_frame(FrameEnd {
            commit: Some(commit),
        })
        .unwrap();
        h.set_selected(false);
        assert!(h.bus_in_flight());

        h.clock_bus();
        assert!(BusLink::selected(&h));
        assert!(!h.event_pending());
        h.clock_bus();
        assert!(!BusLink::selected(&h));
        assert!(h.event_pending());
        assert_eq!(h.take_frame_end().unwrap().commit, Some(commit));
        assert!(!h.bus_in_flight());
    }

    #[test]
    fn test_result_visible_immediately_without_serial_stages() {
        let mut h = ClockedHandoff::new(2, 0).unwrap();
        h.publish_result(ReadResult { data: 0x1234, tag: 3 }).unwrap();
        assert!(h.result_in_flight());
        assert_eq!(h.take_result(), Some(ReadResult { data: 0x1234, tag: 3 }));
        assert_eq!(h.take_result(), None);
    }

    #[test]
    fn test_reset_drops_pending_events() {
        let mut h = ClockedHandoff::new(2, 2).unwrap();
        h.request_read(ReadRequest { address: 1, tag: 1 }).unwrap();
        h.clock_bus();
        h.reset();
        h.clock_bus();
        h.clock_bus();
        assert_eq!(h.take_request(), None);
        assert!(!h.bus_in_flight());
    }

    #[test]
    fn test_frame_ends_queue_behind_a_write_commit() {
        let mut h = ClockedHandoff::new(2, 0).unwrap();
        let commit = WriteCommit {
            address: 0x10,
            data: 0xBEEF,
        };
        h.end_frame(FrameEnd {
            commit: Some(commit),
        })
        .unwrap();
        h.end_frame(FrameEnd { commit: None }).unwrap();
        h.clock_bus();
        h.clock_bus();
        assert_eq!(h.take_frame_end().unwrap().commit, Some(commit));
        assert_eq!(h.take_frame_end().unwrap().commit, None);
        assert_eq!(h.take_frame_end(), None);
    }

    #[test]
    fn test_full_channel_reports_busy() {
        let mut h = ClockedHandoff::new(2, 0).unwrap();
        for _ in 0..CHANNEL_DEPTH {
            h.end_frame(FrameEnd::default()).unwrap();
        }
        assert_eq!(h.end_frame(FrameEnd::default()), Err(Error::HandoffBusy));
    }
}
