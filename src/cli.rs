//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "spibridge")]
#[command(author, version, about = "SPI to Wishbone bridge simulator", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Harness configuration file (TOML format)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Harness options, applied after the config file
    /// (e.g. sysclk=50000,spispeed=1000,ack=wait:3)
    #[arg(short = 's', long = "options", global = true)]
    pub options: Option<String>,

    /// Run the bus side on its own thread instead of the clocked simulator
    #[arg(long, global = true)]
    pub threaded: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read registers through the bridge
    Read {
        /// Register address (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        address: u32,

        /// Number of consecutive registers to read
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,
    },

    /// Write a register through the bridge
    Write {
        /// Register address (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        address: u32,

        /// Data word (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        data: u32,

        /// Read the register back after writing
        #[arg(long)]
        verify: bool,
    },

    /// Run a script of register accesses
    ///
    /// One access per line: `w ADDR DATA`, `r ADDR` or `expect ADDR DATA`.
    /// Everything after `#` is a comment.
    Run {
        /// Script file
        script: PathBuf,

        /// Continue after a failed expectation
        #[arg(long)]
        keep_going: bool,
    },

    /// Random write/read-back round trips
    Stress {
        /// Number of accesses
        #[arg(short = 'n', long, default_value = "1000")]
        count: u64,

        /// Seed for the access pattern (random if not given)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the frame format and timing budget
    Info,
}
