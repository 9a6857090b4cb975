//! Host-side master abstractions
//!
//! This module defines the trait a host implements to drive the bridge's
//! serial pins.

pub mod bitbang;

pub use bitbang::BitbangSpiMaster;
