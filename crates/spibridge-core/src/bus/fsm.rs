//! Bus Transaction State Machine

use core::fmt;

use super::wishbone::{BusControl, BusResponse, BusSignals, BusTarget};
use crate::cdc::{BusLink, ReadResult};
use crate::error::Error;
use crate::frame::{mask, FrameFormat, Transaction};

/// State of the bus transaction state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BusState {
    /// No frame in progress
    #[default]
    Idle = 0,
    /// Frame selected, waiting for a read request or the frame end
    AwaitReadOrEnd = 1,
    /// Drive the read cycle
    ReadIssue = 2,
    /// Hold the read cycle until acknowledge
    ReadWaitAck = 3,
    /// Publish the captured read data
    ReadDone = 4,
    /// Hold the data until the serial side confirms receipt
    ReadHandoff = 5,
    /// Wait for select to deassert after a read
    AwaitFrameEnd = 6,
    /// Drive the write cycle
    WriteIssue = 7,
    /// Hold the write cycle until acknowledge
    WriteWaitAck = 8,
    /// Release the bus after a write
    WriteDone = 9,
}

impl BusState {
    /// Convert from the raw state number
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Idle,
            1 => Self::AwaitReadOrEnd,
            2 => Self::ReadIssue,
            3 => Self::ReadWaitAck,
            4 => Self::ReadDone,
            5 => Self::ReadHandoff,
            6 => Self::AwaitFrameEnd,
            7 => Self::WriteIssue,
            8 => Self::WriteWaitAck,
            9 => Self::WriteDone,
            _ => return None,
        })
    }

    /// Whether a bus cycle is being driven or waited on
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Self::ReadIssue | Self::ReadWaitAck | Self::WriteIssue | Self::WriteWaitAck
        )
    }
}

impl fmt::Display for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::AwaitReadOrEnd => "AWAIT_READ_OR_END",
            Self::ReadIssue => "READ_ISSUE",
            Self::ReadWaitAck => "READ_WAIT_ACK",
            Self::ReadDone => "READ_DONE",
            Self::ReadHandoff => "READ_HANDOFF",
            Self::AwaitFrameEnd => "AWAIT_FRAME_END",
            Self::WriteIssue => "WRITE_ISSUE",
            Self::WriteWaitAck => "WRITE_WAIT_ACK",
            Self::WriteDone => "WRITE_DONE",
        };
        f.write_str(name)
    }
}

/// Bus-side counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Read cycles issued
    pub reads: u64,
    /// Write cycles issued
    pub writes: u64,
    /// Cycles abandoned after the acknowledge timeout
    pub timeouts: u64,
    /// System clocks spent waiting for acknowledge
    pub wait_cycles: u64,
}

/// The bus transaction state machine
///
/// Owns the bus-facing registers. [`clock`](Self::clock) is one system clock
/// edge: the target is evaluated against the signals driven during the
/// cycle, then the machine takes its transition and sets up the signals for
/// the next cycle.
#[derive(Debug, Clone)]
pub struct BusFsm {
    format: FrameFormat,
    ack_timeout: Option<u32>,
    state: BusState,
    signals: BusSignals,
    tag: u8,
    read_data: u32,
    waited: u32,
    last: Option<Transaction>,
    last_error: Option<Error>,
    stats: BusStats,
}

impl BusFsm {
    /// Create an idle state machine
    ///
    /// `ack_timeout` bounds the wait for acknowledge in system clocks; `None`
    /// waits forever.
    pub fn new(format: FrameFormat, ack_timeout: Option<u32>) -> Self {
        Self {
            format,
            ack_timeout,
            state: BusState::Idle,
            signals: BusSignals::default(),
            tag: 0,
            read_data: 0,
            waited: 0,
            last: None,
            last_error: None,
            stats: BusStats::default(),
        }
    }

    /// Run one system clock
    pub fn clock<L, T>(&mut self, link: &mut L, target: &mut T)
    where
        L: BusLink + ?Sized,
        T: BusTarget + ?Sized,
    {
        let response = target.clock(&self.signals);
        let next = self.next_state(link, response);
        if next != self.state {
            log::trace!("bus {} -> {}", self.state, next);
            self.state = next;
        }
    }

    fn next_state<L: BusLink + ?Sized>(&mut self, link: &mut L, response: BusResponse) -> BusState {
        match self.state {
            BusState::Idle => {
                if link.selected() || link.event_pending() {
                    BusState::AwaitReadOrEnd
                } else {
                    BusState::Idle
                }
            }
            BusState::AwaitReadOrEnd => {
                if let Some(request) = link.take_request() {
                    self.signals.address = request.address;
                    self.tag = request.tag;
                    BusState::ReadIssue
                } else if let Some(end) = link.take_frame_end() {
                    match end.commit {
                        Some(commit) => {
                            self.signals.address = commit.address;
                            self.signals.data = commit.data;
                            BusState::WriteIssue
                        }
                        None => BusState::Idle,
                    }
                } else if !link.selected() {
                    BusState::Idle
                } else {
                    BusState::AwaitReadOrEnd
                }
            }
            BusState::ReadIssue => {
                self.drive(BusControl::READ);
                self.signals.data = 0;
                self.stats.reads += 1;
                log::debug!("bus read 0x{:02X}", self.signals.address);
                BusState::ReadWaitAck
            }
            BusState::ReadWaitAck => {
                if response.ack {
                    self.read_data = response.data & self.format.data_mask();
                    self.release();
                    self.last = Some(Transaction {
                        data: self.read_data,
                        ..Transaction::read(self.signals.address)
                    });
                    log::debug!(
                        "bus read 0x{:02X} -> 0x{:X}",
                        self.signals.address,
                        self.read_data
                    );
                    BusState::ReadDone
                } else if self.wait_expired(false) {
                    // all ones marks a bus error on the serial side
                    self.read_data = self.format.data_mask();
                    BusState::ReadDone
                } else {
                    BusState::ReadWaitAck
                }
            }
            BusState::ReadDone => {
                self.release();
                let result = ReadResult {
                    data: self.read_data,
                    tag: self.tag,
                };
                match link.publish_result(result) {
                    Ok(()) => BusState::ReadHandoff,
                    Err(e) => {
                        log::trace!("read result not published yet: {}", e);
                        BusState::ReadDone
                    }
                }
            }
            BusState::ReadHandoff => {
                if link.take_receipt() {
                    BusState::AwaitFrameEnd
                } else {
                    BusState::ReadHandoff
                }
            }
            BusState::AwaitFrameEnd => {
                if link.take_frame_end().is_some() || !link.selected() {
                    BusState::Idle
                } else {
                    BusState::AwaitFrameEnd
                }
            }
            BusState::WriteIssue => {
                self.drive(BusControl::WRITE);
                self.stats.writes += 1;
                log::debug!(
                    "bus write 0x{:02X} <- 0x{:X}",
                    self.signals.address,
                    self.signals.data
                );
                BusState::WriteWaitAck
            }
            BusState::WriteWaitAck => {
                if response.ack {
                    self.release();
                    self.last = Some(Transaction::write(self.signals.address, self.signals.data));
                    BusState::WriteDone
                } else if self.wait_expired(true) {
                    BusState::WriteDone
                } else {
                    BusState::WriteWaitAck
                }
            }
            BusState::WriteDone => {
                self.release();
                BusState::Idle
            }
        }
    }

    fn drive(&mut self, control: BusControl) {
        self.signals.control = control;
        self.signals.select = mask(self.format.byte_lanes()) as u8;
        self.waited = 0;
    }

    fn release(&mut self) {
        self.signals.control = BusControl::empty();
    }

    /// Count one cycle without acknowledge; true once the bound is exceeded
    fn wait_expired(&mut self, write: bool) -> bool {
        self.waited = self.waited.saturating_add(1);
        self.stats.wait_cycles += 1;
        match self.ack_timeout {
            Some(limit) if self.waited >= limit => {
                let err = Error::BusTimeout {
                    address: self.signals.address,
                    write,
                };
                log::error!("{} after {} cycles", err, self.waited);
                self.last_error = Some(err);
                self.stats.timeouts += 1;
                self.release();
                true
            }
            _ => false,
        }
    }

    /// Current state
    pub fn state(&self) -> BusState {
        self.state
    }

    /// Signals driven during the next cycle
    pub fn signals(&self) -> &BusSignals {
        &self.signals
    }

    /// Last completed bus transaction
    pub fn last_transaction(&self) -> Option<Transaction> {
        self.last
    }

    /// Last bus error, if any
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    /// Bus-side counters
    pub fn stats(&self) -> BusStats {
        self.stats
    }

    /// External reset: back to `IDLE` with every bus output deasserted
    ///
    /// Counters and the last error are kept.
    pub fn reset(&mut self) {
        self.state = BusState::Idle;
        self.signals = BusSignals::default();
        self.tag = 0;
        self.read_data = 0;
        self.waited = 0;
    }
}
