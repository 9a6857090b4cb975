//! Error types for the bridge harnesses

use spibridge_core::bus::BusState;
use thiserror::Error;

/// Simulation and runtime errors
#[derive(Debug, Error)]
pub enum SimError {
    /// Error reported by the bridge model
    #[error("Bridge error: {0}")]
    Core(#[from] spibridge_core::Error),

    /// The bridge did not return to idle within the cycle budget
    #[error("Bus stalled in {state} after {cycles} system cycles")]
    BusStalled { cycles: u64, state: BusState },

    /// The threaded bus side did not return to idle in time
    #[error("Timed out after {millis} ms waiting for the bus side (state {state})")]
    Timeout { millis: u64, state: BusState },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Failed to read a configuration file
    #[error("Failed to read '{path}': {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a configuration file
    #[error("Failed to parse '{path}': {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// The bus worker thread could not be started
    #[error("Failed to start bus worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The bus worker thread panicked
    #[error("Bus worker thread panicked")]
    WorkerPanicked,
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, SimError>;
