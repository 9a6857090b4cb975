//! spibridge - SPI to Wishbone bridge simulator
//!
//! Drives a model of the bridge through its serial pins, with an in-memory
//! register bank on the bus side.
//!
//! # Architecture
//!
//! Two harnesses implement the same `BridgeHost` interface:
//! - **Simulator** (default) - Both clock domains on one discrete-event time
//!   line, so clock ratios and synchronizer latencies are exact
//! - **Threaded** (`--threaded`) - The bus state machine runs on its own
//!   thread and meets the serial side only in lock-free mailboxes
//!
//! This allows the same commands (read, write, run, stress) to exercise
//! either of them.

mod cli;
mod commands;
mod harness;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let config = harness::load_config(cli.config.as_deref(), cli.options.as_deref())?;

    match cli.command {
        Commands::Info => commands::info::run_info(&config),
        Commands::Read { address, count } => {
            let mut host = harness::open(&config, cli.threaded)?;
            commands::access::run_read(host.as_mut(), address, count)
        }
        Commands::Write {
            address,
            data,
            verify,
        } => {
            let mut host = harness::open(&config, cli.threaded)?;
            commands::access::run_write(host.as_mut(), address, data, verify)
        }
        Commands::Run { script, keep_going } => {
            let mut host = harness::open(&config, cli.threaded)?;
            commands::script::run_script(host.as_mut(), &script, keep_going)
        }
        Commands::Stress { count, seed } => {
            let mut host = harness::open(&config, cli.threaded)?;
            commands::stress::run_stress(host.as_mut(), &config, count, seed)
        }
    }
}
