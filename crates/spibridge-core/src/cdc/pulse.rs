//! Event channel with a small payload queue

use super::sync::Synchronizer;
use crate::error::{Error, Result};

/// Number of events a [`PulseChannel`] holds before the source is refused
pub const CHANNEL_DEPTH: usize = 4;

/// Event channel between two clock contexts
///
/// The source writes the next payload slot first and then advances a
/// Gray-coded write counter. The destination samples the counter through a
/// [`Synchronizer`] and takes events in order, one slot per count it has
/// observed. A slot is not rewritten until the destination has taken it, so
/// a word is never torn and an event is delivered exactly once.
///
/// When [`CHANNEL_DEPTH`] events are outstanding, [`fire`](Self::fire) fails
/// with [`Error::HandoffBusy`] and the event is not recorded.
#[derive(Debug, Clone)]
pub struct PulseChannel<T> {
    slots: [T; CHANNEL_DEPTH],
    written: u8,
    sync: Synchronizer<u8>,
    taken: u8,
}

impl<T: Copy + Default> PulseChannel<T> {
    /// Create a channel whose destination uses `depth` synchronizer stages
    pub fn new(depth: usize) -> Result<Self> {
        Ok(Self {
            slots: [T::default(); CHANNEL_DEPTH],
            written: 0,
            sync: Synchronizer::new(depth)?,
            taken: 0,
        })
    }

    /// Source side: publish one event
    pub fn fire(&mut self, payload: T) -> Result<()> {
        if self.outstanding() >= CHANNEL_DEPTH {
            return Err(Error::HandoffBusy);
        }
        self.slots[self.written as usize % CHANNEL_DEPTH] = payload;
        self.written = self.written.wrapping_add(1);
        Ok(())
    }

    /// Destination clock edge
    pub fn clock(&mut self) {
        self.sync.clock(gray(self.written));
    }

    /// Write count as seen through the synchronizer
    fn visible(&self) -> u8 {
        from_gray(self.sync.output(gray(self.written)))
    }

    fn outstanding(&self) -> usize {
        self.written.wrapping_sub(self.taken) as usize
    }

    /// Whether the destination has an event to take
    pub fn pending(&self) -> bool {
        self.visible() != self.taken
    }

    /// Whether an event has been fired that the destination has not taken,
    /// including one still travelling through the synchronizer
    pub fn in_flight(&self) -> bool {
        self.written != self.taken
    }

    /// Destination side: take the oldest pending event
    pub fn take(&mut self) -> Option<T> {
        if !self.pending() {
            return None;
        }
        let payload = self.slots[self.taken as usize % CHANNEL_DEPTH];
        self.taken = self.taken.wrapping_add(1);
        Some(payload)
    }

    /// Return both ends to their reset state
    pub fn reset(&mut self) {
        self.slots = [T::default(); CHANNEL_DEPTH];
        self.written = 0;
        self.taken = 0;
        self.sync.reset();
    }
}

fn gray(n: u8) -> u8 {
    n ^ (n >> 1)
}

fn from_gray(g: u8) -> u8 {
    let mut n = g ^ (g >> 4);
    n ^= n >> 2;
    n ^ (n >> 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_round_trip() {
        for n in 0..=255u8 {
            assert_eq!(from_gray(gray(n)), n);
        }
    }

    #[test]
    fn test_single_event_after_sync_latency() {
        let mut ch = PulseChannel::<u32>::new(2).unwrap();
        ch.fire(0xBEEF).unwrap();
        assert!(ch.in_flight());
        assert_eq!(ch.take(), None);
        ch.clock();
        assert_eq!(ch.take(), None);
        ch.clock();
        assert_eq!(ch.take(), Some(0xBEEF));
        // exactly once, however many more clocks arrive
        for _ in 0..10 {
            ch.clock();
            assert_eq!(ch.take(), None);
        }
        assert!(!ch.in_flight());
    }

    #[test]
    fn test_events_straddling_the_synchronizer_arrive_in_order() {
        let mut ch = PulseChannel::<u32>::new(2).unwrap();
        ch.fire(1).unwrap();
        ch.clock();
        ch.fire(2).unwrap();
        ch.clock();
        assert_eq!(ch.take(), Some(1));
        ch.clock();
        assert_eq!(ch.take(), Some(2));
        ch.clock();
        assert_eq!(ch.take(), None);
        assert!(!ch.in_flight());
    }

    #[test]
    fn test_slow_destination_gets_every_event() {
        let mut ch = PulseChannel::<u32>::new(0).unwrap();
        ch.fire(1).unwrap();
        ch.fire(2).unwrap();
        assert_eq!(ch.take(), Some(1));
        assert_eq!(ch.take(), Some(2));
        assert_eq!(ch.take(), None);
    }

    #[test]
    fn test_full_channel_refuses_without_overwriting() {
        let mut ch = PulseChannel::<u32>::new(1).unwrap();
        for i in 0..CHANNEL_DEPTH as u32 {
            ch.fire(i).unwrap();
        }
        assert_eq!(ch.fire(99), Err(Error::HandoffBusy));
        ch.clock();
        for i in 0..CHANNEL_DEPTH as u32 {
            assert_eq!(ch.take(), Some(i));
        }
        assert_eq!(ch.take(), None);
        ch.fire(7).unwrap();
        ch.clock();
        assert_eq!(ch.take(), Some(7));
    }

    #[test]
    fn test_sequence_wraps() {
        let mut ch = PulseChannel::<u32>::new(1).unwrap();
        for i in 0..600u32 {
            ch.fire(i).unwrap();
            ch.clock();
            assert_eq!(ch.take(), Some(i));
        }
    }
}
