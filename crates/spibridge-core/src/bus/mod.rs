//! Bus side of the bridge
//!
//! The bus transaction state machine runs on the system clock and drives a
//! Wishbone-style initiator port. The target behind it is an external
//! collaborator reached through [`BusTarget`].

mod fsm;
mod wishbone;

pub use fsm::{BusFsm, BusState, BusStats};
pub use wishbone::{BusControl, BusResponse, BusSignals, BusTarget};
