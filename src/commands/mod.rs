//! CLI command implementations
//!
//! Every command except `info` works on a `BridgeHost`, so the same code
//! drives the clocked simulator and the threaded runtime.

pub mod access;
pub mod info;
pub mod script;
pub mod stress;
