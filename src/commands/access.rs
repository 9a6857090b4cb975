//! Single register reads and writes

use spibridge_sim::BridgeHost;

/// Read `count` consecutive registers starting at `address`
pub fn run_read(
    host: &mut dyn BridgeHost,
    address: u32,
    count: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = host.format();
    for offset in 0..count {
        let address = address
            .checked_add(offset)
            .ok_or_else(|| format!("Address 0x{:X} + {} is out of range", address, offset))?;
        format.check(&spibridge_core::Transaction::read(address))?;
        let data = read_checked(host, address)?;
        println!("0x{:02X}: 0x{:0width$X}", address, data, width = hex_digits(format.data_width()));
    }
    Ok(())
}

/// Write one register, optionally reading it back
pub fn run_write(
    host: &mut dyn BridgeHost,
    address: u32,
    data: u32,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = host.format();
    write_checked(host, address, data)?;
    println!("Wrote 0x{:X} to 0x{:02X}", data, address);

    if verify {
        let readback = read_checked(host, address)?;
        if readback != data & format.data_mask() {
            return Err(format!(
                "Verify failed at 0x{:02X}: wrote 0x{:X}, read 0x{:X}",
                address, data, readback
            )
            .into());
        }
        println!("Verified.");
    }
    Ok(())
}

/// Write a register and fail if the bus cycle timed out
pub fn write_checked(
    host: &mut dyn BridgeHost,
    address: u32,
    data: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let timeouts = host.stats().bus.timeouts;
    host.write_register(address, data)?;
    if host.stats().bus.timeouts != timeouts {
        return Err(match host.last_bus_error() {
            Some(e) => format!("Write to 0x{:02X} failed: {}", address, e),
            None => format!("Write to 0x{:02X} timed out on the bus", address),
        }
        .into());
    }
    Ok(())
}

/// Read a register and make sure the data really came from the bus
pub fn read_checked(
    host: &mut dyn BridgeHost,
    address: u32,
) -> Result<u32, Box<dyn std::error::Error>> {
    let before = host.stats();
    let data = host.read_register(address)?;
    let after = host.stats();
    if after.bus.timeouts != before.bus.timeouts {
        return Err(format!("Read of 0x{:02X} timed out on the bus", address).into());
    }
    if after.serial.results_accepted == before.serial.results_accepted {
        return Err(format!(
            "Read data for 0x{:02X} arrived after the frame ended (bus state {})",
            address,
            host.bus_state()
        )
        .into());
    }
    Ok(data)
}

/// Hex digits needed for a `bits`-wide word
pub fn hex_digits(bits: u32) -> usize {
    bits.div_ceil(4) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use spibridge_regs::AckPolicy;
    use spibridge_sim::{open_bridge, SimConfig};

    #[test]
    fn test_read_past_end_of_address_space() {
        let mut host = open_bridge(&SimConfig::default(), false).unwrap();
        assert!(run_read(host.as_mut(), u32::MAX, 2).is_err());
        assert_eq!(host.stats().serial.frames, 0);
    }

    #[test]
    fn test_write_timeout_is_an_error() {
        let config = SimConfig::default()
            .with_ack(AckPolicy::Never)
            .with_ack_timeout(Some(16));
        let mut host = open_bridge(&config, false).unwrap();
        let err = write_checked(host.as_mut(), 0x10, 0xBEEF).unwrap_err();
        assert!(err.to_string().contains("0x10"), "{}", err);
        assert!(run_write(host.as_mut(), 0x11, 1, false).is_err());
    }

    #[test]
    fn test_hex_digits() {
        assert_eq!(hex_digits(16), 4);
        assert_eq!(hex_digits(9), 3);
    }
}
