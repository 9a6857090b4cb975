//! spibridge-core - Model of a serial-to-bus protocol bridge
//!
//! This crate models an SPI slave that turns serial frames of the form
//! `[direction:1][address:A][data:D]` into Wishbone-style bus transactions.
//! The serial side and the bus side run from unrelated clocks and only talk
//! through a cross-domain handoff. It is `no_std` compatible so the same
//! state machines can run in a host simulator or on a microcontroller.
//!
//! # Features
//!
//! - `std` - Enable standard library support (`std::error::Error` for [`Error`])
//!
//! # Example
//!
//! ```ignore
//! use spibridge_core::{protocol, programmer::BitbangSpiMaster, FrameFormat};
//!
//! fn poke<M: BitbangSpiMaster>(master: &mut M) -> spibridge_core::Result<u32> {
//!     let fmt = FrameFormat::default();
//!     protocol::write_register(master, &fmt, 0x10, 0xBEEF)?;
//!     protocol::read_register(master, &fmt, 0x10)
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod bridge;
pub mod bus;
pub mod cdc;
pub mod error;
pub mod frame;
pub mod programmer;
pub mod protocol;
pub mod serial;

pub use bridge::{BridgeConfig, BridgeStats, Spi2Wb};
pub use error::{Error, Result};
pub use frame::{Direction, FrameFormat, Transaction};
