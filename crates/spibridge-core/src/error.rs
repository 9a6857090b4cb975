//! Error types for spibridge-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Configuration errors
    /// Frame format widths are out of range
    InvalidFrameFormat {
        /// Requested address field width
        address_width: u32,
        /// Requested data field width
        data_width: u32,
    },
    /// Synchronizer depth exceeds the supported number of stages
    InvalidSyncDepth(usize),

    // Frame errors
    /// Address does not fit in the address field
    AddressOutOfRange(u32),
    /// Data does not fit in the data field
    DataOutOfRange(u32),

    // Handoff errors
    /// A handoff channel has no room for another event
    HandoffBusy,

    // Bus errors
    /// The bus target did not acknowledge within the configured bound
    BusTimeout {
        /// Address of the stalled bus cycle
        address: u32,
        /// Whether the stalled cycle was a write
        write: bool,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFrameFormat {
                address_width,
                data_width,
            } => write!(
                f,
                "invalid frame format: 1 + {} address bits + {} data bits (each field needs at least 1 bit, 32 bits total at most)",
                address_width, data_width
            ),
            Self::InvalidSyncDepth(depth) => {
                write!(f, "invalid synchronizer depth {}", depth)
            }
            Self::AddressOutOfRange(addr) => {
                write!(f, "address 0x{:X} does not fit in the address field", addr)
            }
            Self::DataOutOfRange(data) => {
                write!(f, "data 0x{:X} does not fit in the data field", data)
            }
            Self::HandoffBusy => write!(f, "handoff channel busy"),
            Self::BusTimeout { address, write } => write!(
                f,
                "bus {} cycle at 0x{:02X} was never acknowledged",
                if *write { "write" } else { "read" },
                address
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
