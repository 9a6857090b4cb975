//! Protocol implementations
//!
//! This module contains the host side of the bridge's serial frame protocol.

mod spi2wb;

pub use spi2wb::*;
