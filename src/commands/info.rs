//! Frame format and timing budget

use spibridge_regs::AckPolicy;
use spibridge_sim::SimConfig;

/// System cycles from a read request leaving the serial side to the result
/// being published, with `wait_states` cycles without acknowledge
///
/// Synchronizer stages, then AWAIT_READ_OR_END, READ_ISSUE, READ_WAIT_ACK
/// and READ_DONE one cycle each.
pub fn read_latency(config: &SimConfig, wait_states: u32) -> u64 {
    config.bus_sync_stages as u64 + 4 + wait_states as u64
}

fn format_hz(hz: u64) -> String {
    if hz >= 1_000_000 {
        format!("{:.3} MHz", hz as f64 / 1e6)
    } else if hz >= 1_000 {
        format!("{:.3} kHz", hz as f64 / 1e3)
    } else {
        format!("{} Hz", hz)
    }
}

/// Print the frame layout and whether reads fit into the half period
pub fn run_info(config: &SimConfig) -> Result<(), Box<dyn std::error::Error>> {
    let format = config.frame_format()?;

    println!("Frame Format");
    println!("============");
    println!();
    println!("Frame width:     {} bits", format.width());
    println!(
        "Layout:          [dir:1][addr:{}][data:{}], MSB first",
        format.address_width(),
        format.data_width()
    );
    println!("Decode point:    bit {}", format.decode_point());
    println!("Counter width:   {} bits", format.counter_width());
    println!("Byte lanes:      {}", format.byte_lanes());
    println!("Registers:       {} words", config.register_depth);
    println!();

    println!("Timing");
    println!("======");
    println!();
    println!("System clock:    {}", format_hz(config.sys_clock_hz));
    println!("Serial clock:    {}", format_hz(config.spi_clock_hz));
    println!(
        "Half period:     {:.2} system cycles",
        config.clock_ratio()
    );
    println!(
        "Synchronizers:   {} (bus side), {} (serial side)",
        config.bus_sync_stages, config.serial_sync_stages
    );

    let budget = config.clock_ratio();
    let latency = match config.ack {
        AckPolicy::Immediate => Some(read_latency(config, 0)),
        AckPolicy::WaitStates(n) => Some(read_latency(config, n)),
        AckPolicy::Never => config.ack_timeout.map(|t| read_latency(config, t)),
    };
    match latency {
        Some(cycles) => {
            println!("Read latency:    {} system cycles", cycles);
            if (cycles as f64) <= budget {
                println!("Read data is ready before the first data bit.");
            } else if cycles <= config.turnaround_cycles as u64 {
                println!(
                    "Read data needs the clock stretched by ~{:.0} system cycles (budget {}).",
                    cycles as f64 - budget,
                    config.turnaround_cycles
                );
            } else {
                println!(
                    "Read data arrives after the frame; reads will be abandoned \
                     (turnaround budget {} cycles).",
                    config.turnaround_cycles
                );
            }
        }
        None => println!("Read latency:    unbounded (target never acknowledges, no timeout)"),
    }
    Ok(())
}
