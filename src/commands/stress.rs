//! Random write/read-back stress run

use std::collections::HashMap;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spibridge_sim::{BridgeHost, SimConfig};

use super::access::read_checked;

/// Create the progress bar for `total` accesses
fn create_progress_bar(total: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, {eta}) {msg}")?
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// First address the stress run may write
///
/// The ID registers are read-only, so writes to them would never read back.
fn first_address(config: &SimConfig) -> u32 {
    if config.id_registers {
        2
    } else {
        0
    }
}

/// Run `count` random accesses, checking every read against a shadow copy
pub fn run_stress(
    host: &mut dyn BridgeHost,
    config: &SimConfig,
    count: u64,
    seed: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let seed = seed.unwrap_or_else(|| rand::rng().random());
    println!("Stress run: {} accesses, seed {}", count, seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let format = host.format();
    // addresses beyond the register depth alias onto lower ones
    let end = (format.address_mask() as u64 + 1).min(config.register_depth as u64) as u32;
    let start = first_address(config);
    if start >= end {
        return Err("No writable registers in the address range".into());
    }

    let mut shadow: HashMap<u32, u32> = HashMap::new();
    let mut mismatches = 0u64;
    let pb = create_progress_bar(count)?;
    for _ in 0..count {
        let address = rng.random_range(start..end);
        match shadow.get(&address) {
            Some(&expected) if rng.random_bool(0.5) => {
                let actual = read_checked(host, address)?;
                if actual != expected {
                    mismatches += 1;
                    pb.println(format!(
                        "Mismatch at 0x{:02X}: expected 0x{:X}, read 0x{:X}",
                        address, expected, actual
                    ));
                }
            }
            _ => {
                let data = rng.random_range(0..=format.data_mask());
                host.write_register(address, data)?;
                shadow.insert(address, data);
            }
        }
        pb.inc(1);
        if mismatches > 0 {
            pb.set_message(format!("{} mismatches", mismatches));
        }
    }
    pb.finish_and_clear();

    let stats = host.stats();
    println!(
        "Frames: {}  bus reads: {}  bus writes: {}",
        stats.serial.frames, stats.bus.reads, stats.bus.writes
    );
    println!(
        "Wait cycles: {}  timeouts: {}  stale results: {}  handoff faults: {}",
        stats.bus.wait_cycles,
        stats.bus.timeouts,
        stats.serial.stale_results,
        stats.serial.handoff_faults
    );
    if mismatches > 0 {
        return Err(format!("{} of {} accesses mismatched", mismatches, count).into());
    }
    println!("No mismatches.");
    Ok(())
}
