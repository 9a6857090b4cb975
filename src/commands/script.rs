//! Register access scripts
//!
//! ```text
//! # program the divider, then check it stuck
//! w 0x10 0xBEEF
//! r 0x10
//! expect 0x10 0xBEEF
//! ```

use std::fs;
use std::path::Path;

use spibridge_sim::BridgeHost;

use super::access::{hex_digits, read_checked, write_checked};
use crate::cli::parse_hex_u32;

/// One line of a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `w ADDR DATA`
    Write { address: u32, data: u32 },
    /// `r ADDR`
    Read { address: u32 },
    /// `expect ADDR DATA`
    Expect { address: u32, data: u32 },
}

/// Parse a script into steps, paired with their line numbers
pub fn parse_script(content: &str) -> Result<Vec<(usize, Step)>, String> {
    let mut steps = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let arg = |i: usize| -> Result<u32, String> {
            let word = words
                .get(i)
                .ok_or_else(|| format!("line {}: missing argument in '{}'", line_no, line))?;
            parse_hex_u32(word).map_err(|e| format!("line {}: {}", line_no, e))
        };
        let (step, arity) = match words[0] {
            "w" | "write" => (
                Step::Write {
                    address: arg(1)?,
                    data: arg(2)?,
                },
                3,
            ),
            "r" | "read" => (Step::Read { address: arg(1)? }, 2),
            "expect" => (
                Step::Expect {
                    address: arg(1)?,
                    data: arg(2)?,
                },
                3,
            ),
            other => return Err(format!("line {}: unknown command '{}'", line_no, other)),
        };
        if words.len() > arity {
            return Err(format!("line {}: trailing arguments in '{}'", line_no, line));
        }
        steps.push((line_no, step));
    }
    Ok(steps)
}

/// Run a script file against the bridge
pub fn run_script(
    host: &mut dyn BridgeHost,
    path: &Path,
    keep_going: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let steps = parse_script(&content)?;
    log::info!("Running {} steps from {:?}", steps.len(), path);
    run_steps(host, &steps, keep_going)
}

/// Run parsed steps against the bridge
pub fn run_steps(
    host: &mut dyn BridgeHost,
    steps: &[(usize, Step)],
    keep_going: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let digits = hex_digits(host.format().data_width());
    let mut failures = 0;
    for &(line, step) in steps {
        match step {
            Step::Write { address, data } => {
                write_checked(host, address, data)
                    .map_err(|e| format!("line {}: {}", line, e))?;
                log::debug!("line {}: wrote 0x{:X} to 0x{:02X}", line, data, address);
            }
            Step::Read { address } => {
                let data =
                    read_checked(host, address).map_err(|e| format!("line {}: {}", line, e))?;
                println!("0x{:02X}: 0x{:0width$X}", address, data, width = digits);
            }
            Step::Expect { address, data } => {
                let actual =
                    read_checked(host, address).map_err(|e| format!("line {}: {}", line, e))?;
                if actual != data {
                    failures += 1;
                    println!(
                        "line {}: expected 0x{:0width$X} at 0x{:02X}, got 0x{:0width$X}",
                        line,
                        data,
                        address,
                        actual,
                        width = digits
                    );
                    if !keep_going {
                        break;
                    }
                }
            }
        }
    }

    let stats = host.stats();
    println!(
        "{} frames, {} bus reads, {} bus writes",
        stats.serial.frames, stats.bus.reads, stats.bus.writes
    );
    if failures > 0 {
        return Err(format!("{} expectation(s) failed", failures).into());
    }
    Ok(())
}
