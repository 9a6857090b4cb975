//! Harness configuration
//!
//! A [`SimConfig`] can be built from defaults and builder methods, from a
//! `key=value` option list (the `-s` string of the CLI) or from a TOML file:
//!
//! ```toml
//! sys_clock_hz = 50_000_000
//! spi_clock_hz = 1_000_000
//! address_width = 7
//! data_width = 16
//! ack = "wait:3"
//! ack_timeout = 1000
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use spibridge_core::{BridgeConfig, FrameFormat};
use spibridge_regs::{AckPolicy, RegisterFileConfig};

use crate::error::{Result, SimError};

/// Default system clock (50 MHz)
const DEFAULT_SYS_CLOCK_HZ: u64 = 50_000_000;
/// Default serial clock (1 MHz)
const DEFAULT_SPI_CLOCK_HZ: u64 = 1_000_000;

/// Configuration shared by the simulator and the threaded runtime
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// System clock frequency in Hz
    pub sys_clock_hz: u64,
    /// Serial clock frequency in Hz
    pub spi_clock_hz: u64,
    /// Offset of the first system clock edge in picoseconds
    pub sys_phase_ps: u64,
    /// Address field width
    pub address_width: u32,
    /// Data field width
    pub data_width: u32,
    /// Register file acknowledge policy
    pub ack: AckPolicy,
    /// Bridge acknowledge timeout in system cycles
    pub ack_timeout: Option<u32>,
    /// Synchronizer stages on the system clock side
    pub bus_sync_stages: usize,
    /// Synchronizer stages on the serial clock side
    pub serial_sync_stages: usize,
    /// Register file depth in words
    pub register_depth: usize,
    /// Preload the read-only ID registers
    pub id_registers: bool,
    /// System cycles the simulated master may stretch the clock before read data
    pub turnaround_cycles: u32,
    /// System cycles `settle` waits for the bridge to go idle
    pub settle_cycles: u64,
    /// Half period of the threaded runtime's serial clock
    pub thread_half_period: Duration,
    /// How long the threaded master waits for read data at turnaround
    pub thread_turnaround_timeout: Duration,
    /// How long the threaded runtime waits for the bus side to go idle
    pub thread_settle_timeout: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            sys_clock_hz: DEFAULT_SYS_CLOCK_HZ,
            spi_clock_hz: DEFAULT_SPI_CLOCK_HZ,
            sys_phase_ps: 3_141,
            address_width: 7,
            data_width: 16,
            ack: AckPolicy::Immediate,
            ack_timeout: None,
            bus_sync_stages: 2,
            serial_sync_stages: 0,
            register_depth: 128,
            id_registers: true,
            turnaround_cycles: 64,
            settle_cycles: 10_000,
            thread_half_period: Duration::ZERO,
            thread_turnaround_timeout: Duration::from_millis(100),
            thread_settle_timeout: Duration::from_secs(1),
        }
    }
}

impl SimConfig {
    /// Set the system clock frequency
    pub fn with_sys_clock_hz(mut self, hz: u64) -> Self {
        self.sys_clock_hz = hz;
        self
    }

    /// Set the serial clock frequency
    pub fn with_spi_clock_hz(mut self, hz: u64) -> Self {
        self.spi_clock_hz = hz;
        self
    }

    /// Set the serial half period directly, in picoseconds
    ///
    /// Handy for exact non-integer clock ratios.
    pub fn with_half_period_ps(mut self, ps: u64) -> Self {
        if ps > 0 {
            self.spi_clock_hz = 500_000_000_000 / ps;
        }
        self
    }

    /// Set the frame field widths
    pub fn with_format(mut self, address_width: u32, data_width: u32) -> Self {
        self.address_width = address_width;
        self.data_width = data_width;
        self
    }

    /// Set the register file acknowledge policy
    pub fn with_ack(mut self, ack: AckPolicy) -> Self {
        self.ack = ack;
        self
    }

    /// Bound the bridge's wait for acknowledge
    pub fn with_ack_timeout(mut self, cycles: Option<u32>) -> Self {
        self.ack_timeout = cycles;
        self
    }

    /// Set both synchronizer depths
    pub fn with_sync_stages(mut self, bus: usize, serial: usize) -> Self {
        self.bus_sync_stages = bus;
        self.serial_sync_stages = serial;
        self
    }

    /// Set the simulated master's turnaround budget
    pub fn with_turnaround_cycles(mut self, cycles: u32) -> Self {
        self.turnaround_cycles = cycles;
        self
    }

    /// Set the threaded runtime's serial half period
    pub fn with_thread_half_period(mut self, half_period: Duration) -> Self {
        self.thread_half_period = half_period;
        self
    }

    /// System clock period in picoseconds
    pub fn sys_period_ps(&self) -> u64 {
        1_000_000_000_000 / self.sys_clock_hz.max(1)
    }

    /// Serial clock half period in picoseconds
    pub fn half_period_ps(&self) -> u64 {
        500_000_000_000 / self.spi_clock_hz.max(1)
    }

    /// Serial half period measured in system clock periods
    pub fn clock_ratio(&self) -> f64 {
        self.half_period_ps() as f64 / self.sys_period_ps() as f64
    }

    /// Validated frame format
    pub fn frame_format(&self) -> Result<FrameFormat> {
        Ok(FrameFormat::new(self.address_width, self.data_width)?)
    }

    /// Bridge configuration
    pub fn bridge_config(&self) -> Result<BridgeConfig> {
        let config = BridgeConfig::default()
            .with_format(self.frame_format()?)
            .with_ack_timeout(self.ack_timeout)
            .with_bus_sync_stages(self.bus_sync_stages)
            .with_serial_sync_stages(self.serial_sync_stages);
        config.validate()?;
        Ok(config)
    }

    /// Register file configuration
    pub fn register_config(&self) -> RegisterFileConfig {
        let config = RegisterFileConfig::default()
            .with_depth(self.register_depth)
            .with_data_width(self.data_width)
            .with_ack(self.ack);
        if self.id_registers {
            config.with_id_registers()
        } else {
            config
        }
    }

    /// Check the configuration as a whole
    pub fn validate(&self) -> Result<()> {
        if self.sys_clock_hz == 0 || self.spi_clock_hz == 0 {
            return Err(SimError::InvalidParameter(
                "clock frequencies must be non-zero".to_string(),
            ));
        }
        if self.register_depth == 0 {
            return Err(SimError::InvalidParameter(
                "register depth must be non-zero".to_string(),
            ));
        }
        self.bridge_config()?;
        Ok(())
    }

    /// Apply `key=value` options on top of this configuration
    ///
    /// Unknown keys are logged and ignored.
    pub fn apply_options(mut self, options: &[(&str, &str)]) -> std::result::Result<Self, String> {
        for (key, value) in options {
            match *key {
                "sysclk" => {
                    self.sys_clock_hz = value
                        .parse::<u64>()
                        .ok()
                        .and_then(|khz| khz.checked_mul(1000))
                        .ok_or_else(|| format!("Invalid sysclk value: {}", value))?;
                }
                "spispeed" => {
                    self.spi_clock_hz = value
                        .parse::<u64>()
                        .ok()
                        .and_then(|khz| khz.checked_mul(1000))
                        .ok_or_else(|| format!("Invalid spispeed value: {}", value))?;
                }
                "phase" => {
                    self.sys_phase_ps = value
                        .parse()
                        .map_err(|_| format!("Invalid phase value: {}", value))?;
                }
                "addr_bits" => {
                    self.address_width = value
                        .parse()
                        .map_err(|_| format!("Invalid addr_bits value: {}", value))?;
                }
                "data_bits" => {
                    self.data_width = value
                        .parse()
                        .map_err(|_| format!("Invalid data_bits value: {}", value))?;
                }
                "ack" => {
                    self.ack = parse_ack_policy(value)?;
                }
                "timeout" => {
                    self.ack_timeout = parse_timeout(value)?;
                }
                "bus_sync" => {
                    self.bus_sync_stages = value
                        .parse()
                        .map_err(|_| format!("Invalid bus_sync value: {}", value))?;
                }
                "serial_sync" => {
                    self.serial_sync_stages = value
                        .parse()
                        .map_err(|_| format!("Invalid serial_sync value: {}", value))?;
                }
                "depth" => {
                    self.register_depth = value
                        .parse()
                        .map_err(|_| format!("Invalid depth value: {}", value))?;
                }
                "ids" => {
                    self.id_registers = parse_bool(value)
                        .ok_or_else(|| format!("Invalid ids value: {}", value))?;
                }
                "turnaround" => {
                    self.turnaround_cycles = value
                        .parse()
                        .map_err(|_| format!("Invalid turnaround value: {}", value))?;
                }
                "half_period_us" => {
                    let us: u64 = value
                        .parse()
                        .map_err(|_| format!("Invalid half_period_us value: {}", value))?;
                    self.thread_half_period = Duration::from_micros(us);
                }
                _ => {
                    log::warn!("sim: Unknown option: {}={}", key, value);
                }
            }
        }
        Ok(self)
    }

    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SimError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            SimError::ConfigParse { source, .. } => SimError::ConfigParse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    /// Parse a configuration from a TOML string
    ///
    /// Keys that are absent keep their default values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlSimConfig = toml::from_str(content).map_err(|source| SimError::ConfigParse {
            path: "<string>".to_string(),
            source,
        })?;
        let mut config = SimConfig::default();
        let d = &mut config;

        if let Some(v) = file.sys_clock_hz {
            d.sys_clock_hz = v;
        }
        if let Some(v) = file.spi_clock_hz {
            d.spi_clock_hz = v;
        }
        if let Some(v) = file.sys_phase_ps {
            d.sys_phase_ps = v;
        }
        if let Some(v) = file.address_width {
            d.address_width = v;
        }
        if let Some(v) = file.data_width {
            d.data_width = v;
        }
        if let Some(v) = file.ack {
            d.ack = parse_ack_policy(&v).map_err(SimError::InvalidParameter)?;
        }
        if let Some(v) = file.ack_timeout {
            d.ack_timeout = (v > 0).then_some(v);
        }
        if let Some(v) = file.bus_sync_stages {
            d.bus_sync_stages = v;
        }
        if let Some(v) = file.serial_sync_stages {
            d.serial_sync_stages = v;
        }
        if let Some(v) = file.register_depth {
            d.register_depth = v;
        }
        if let Some(v) = file.id_registers {
            d.id_registers = v;
        }
        if let Some(v) = file.turnaround_cycles {
            d.turnaround_cycles = v;
        }
        if let Some(v) = file.settle_cycles {
            d.settle_cycles = v;
        }
        if let Some(v) = file.thread_half_period_us {
            d.thread_half_period = Duration::from_micros(v);
        }
        if let Some(v) = file.thread_turnaround_timeout_ms {
            d.thread_turnaround_timeout = Duration::from_millis(v);
        }
        if let Some(v) = file.thread_settle_timeout_ms {
            d.thread_settle_timeout = Duration::from_millis(v);
        }

        config.validate()?;
        Ok(config)
    }
}

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TomlSimConfig {
    sys_clock_hz: Option<u64>,
    spi_clock_hz: Option<u64>,
    sys_phase_ps: Option<u64>,
    address_width: Option<u32>,
    data_width: Option<u32>,
    ack: Option<String>,
    ack_timeout: Option<u32>,
    bus_sync_stages: Option<usize>,
    serial_sync_stages: Option<usize>,
    register_depth: Option<usize>,
    id_registers: Option<bool>,
    turnaround_cycles: Option<u32>,
    settle_cycles: Option<u64>,
    thread_half_period_us: Option<u64>,
    thread_turnaround_timeout_ms: Option<u64>,
    thread_settle_timeout_ms: Option<u64>,
}

/// Parse an acknowledge policy: `immediate`, `never`, `wait:N` or plain `N`
pub fn parse_ack_policy(value: &str) -> std::result::Result<AckPolicy, String> {
    let value = value.trim();
    match value {
        "immediate" | "0" => Ok(AckPolicy::Immediate),
        "never" | "none" => Ok(AckPolicy::Never),
        _ => {
            let n = value.strip_prefix("wait:").unwrap_or(value);
            n.parse()
                .map(AckPolicy::WaitStates)
                .map_err(|_| format!("Invalid ack value: {}", value))
        }
    }
}

/// Parse a timeout in cycles; `0` or `none` disables it
fn parse_timeout(value: &str) -> std::result::Result<Option<u32>, String> {
    match value {
        "none" | "0" => Ok(None),
        _ => value
            .parse()
            .map(Some)
            .map_err(|_| format!("Invalid timeout value: {}", value)),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse programmer-style options into a configuration
///
/// # Example Options
///
/// - `sysclk=50000` - System clock in kHz
/// - `spispeed=1000` - Serial clock in kHz
/// - `addr_bits=7`, `data_bits=16` - Frame field widths
/// - `ack=immediate|never|wait:N` - Register file acknowledge policy
/// - `timeout=N` - Bridge acknowledge timeout in system cycles (`0` disables)
/// - `bus_sync=2`, `serial_sync=0` - Synchronizer depths
/// - `depth=128` - Register file depth
/// - `ids=yes` - Preload the ID registers
/// - `turnaround=64` - Clock stretch budget before read data, in system cycles
/// - `half_period_us=0` - Threaded runtime serial half period
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<SimConfig, String> {
    let config = SimConfig::default().apply_options(options)?;
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert_eq!(config.sys_period_ps(), 20_000);
        assert_eq!(config.half_period_ps(), 500_000);
        assert_eq!(config.clock_ratio(), 25.0);
        assert_eq!(config.frame_format().unwrap(), FrameFormat::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_half_period_ps() {
        let config = SimConfig::default()
            .with_sys_clock_hz(100_000_000)
            .with_half_period_ps(23_000);
        assert_eq!(config.half_period_ps(), 23_000);
        assert_eq!(config.clock_ratio(), 2.3);
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[
            ("sysclk", "100000"),
            ("spispeed", "500"),
            ("ack", "wait:3"),
            ("timeout", "200"),
            ("addr_bits", "5"),
            ("data_bits", "8"),
            ("ids", "no"),
            ("bogus", "1"),
        ])
        .unwrap();
        assert_eq!(config.sys_clock_hz, 100_000_000);
        assert_eq!(config.spi_clock_hz, 500_000);
        assert_eq!(config.ack, AckPolicy::WaitStates(3));
        assert_eq!(config.ack_timeout, Some(200));
        assert_eq!(config.frame_format().unwrap().width(), 14);
        assert!(!config.id_registers);
    }

    #[test]
    fn test_parse_options_rejects_bad_values() {
        assert!(parse_options(&[("spispeed", "fast")]).is_err());
        assert!(parse_options(&[("ack", "sometimes")]).is_err());
        assert!(parse_options(&[("addr_bits", "0")]).is_err());
        assert!(parse_options(&[("bus_sync", "9")]).is_err());
        let err = parse_options(&[("sysclk", "18446744073709552")]).unwrap_err();
        assert!(err.contains("Invalid sysclk value"), "{}", err);
        assert!(parse_options(&[("spispeed", &u64::MAX.to_string())]).is_err());
    }

    #[test]
    fn test_ack_policy_forms() {
        assert_eq!(parse_ack_policy("immediate"), Ok(AckPolicy::Immediate));
        assert_eq!(parse_ack_policy("never"), Ok(AckPolicy::Never));
        assert_eq!(parse_ack_policy("4"), Ok(AckPolicy::WaitStates(4)));
    }

    #[test]
    fn test_from_toml_str() {
        let config = SimConfig::from_toml_str(
            r#"
            sys_clock_hz = 100_000_000
            spi_clock_hz = 2_000_000
            ack = "never"
            ack_timeout = 50
            serial_sync_stages = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.sys_clock_hz, 100_000_000);
        assert_eq!(config.ack, AckPolicy::Never);
        assert_eq!(config.ack_timeout, Some(50));
        assert_eq!(config.serial_sync_stages, 2);
        assert_eq!(config.address_width, 7);
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        assert!(matches!(
            SimConfig::from_toml_str("clock = 1"),
            Err(SimError::ConfigParse { .. })
        ));
    }
}
