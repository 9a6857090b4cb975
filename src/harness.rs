//! Harness selection and configuration loading

use std::path::Path;

use spibridge_sim::{open_bridge, BridgeHost, SimConfig};

/// Parse an option string (`key=value,key=value`)
pub fn parse_option_string(s: &str) -> Result<Vec<(&str, &str)>, Box<dyn std::error::Error>> {
    let mut options = Vec::new();
    for opt in s.split(',').map(str::trim).filter(|opt| !opt.is_empty()) {
        match opt.split_once('=') {
            Some(pair) => options.push(pair),
            None => {
                return Err(
                    format!("Invalid option format: '{}' (expected key=value)", opt).into(),
                )
            }
        }
    }
    Ok(options)
}

/// Build the harness configuration: defaults, then the file, then the options
pub fn load_config(
    path: Option<&Path>,
    options: Option<&str>,
) -> Result<SimConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => {
            let config = SimConfig::from_toml_file(path)?;
            log::info!("Loaded configuration from {:?}", path);
            config
        }
        None => SimConfig::default(),
    };
    if let Some(options) = options {
        config = config.apply_options(&parse_option_string(options)?)?;
    }
    config.validate()?;
    Ok(config)
}

/// Open the selected harness
pub fn open(
    config: &SimConfig,
    threaded: bool,
) -> Result<Box<dyn BridgeHost>, Box<dyn std::error::Error>> {
    let host = open_bridge(config, threaded)?;
    let format = host.format();
    log::info!(
        "Using {} harness, frame {} bits (A={}, D={})",
        if threaded { "threaded" } else { "simulated" },
        format.width(),
        format.address_width(),
        format.data_width()
    );
    Ok(host)
}
