//! Service configuration loading tests.
//!
//! Tests for `SpiMuxConfig::load_validated()`: defaults, simulated bus
//! routing, startup devices, validation failures surfacing through the
//! loader.

use spimux_common::config::{ConfigError, LogLevel};
use spimux_common::spi::config::SpiMuxConfig;
use spimux_common::spi::types::{BusConfiguration, GpioPin, SpiMode};
use std::fs;
use tempfile::TempDir;

/// Write `content` as spimux.toml in a fresh directory.
fn write_config(content: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("spimux.toml");
    fs::write(&path, content).unwrap();
    (dir, path)
}

#[test]
fn loads_full_config() {
    let (_dir, path) = write_config(
        r#"
[shared]
log_level = "trace"
service_name = "rig-01"

[driver]
name = "simulation"

[simulation]
ports = [0, 1]
idle_byte = 0

[[simulation.bus]]
index = 0
clock = 14
miso = 12
mosi = 13
max_clock_hz = 80000000

[[simulation.bus]]
index = 1
clock = 18
miso = 19
mosi = 23

[[devices]]
name = "display"
bus = 0
chip_select = 15
clock_rate_hz = 10000000

[[devices]]
name = "adc"
bus = 1
chip_select = 5
clock_rate_hz = 1000000
mode = "mode1"
bus_configuration = "half_duplex"
"#,
    );

    let config = SpiMuxConfig::load_validated(&path).expect("valid config");
    assert_eq!(config.shared.log_level, LogLevel::Trace);
    assert_eq!(config.shared.service_name, "rig-01");
    assert_eq!(config.simulation.idle_byte, 0);
    assert_eq!(config.simulation.buses.len(), 2);
    assert_eq!(config.simulation.bus(0).unwrap().max_clock_hz, Some(80_000_000));
    assert_eq!(config.simulation.bus(1).unwrap().max_clock_hz, None);

    assert_eq!(config.devices.len(), 2);
    let adc = &config.devices[1];
    assert_eq!(adc.name, "adc");
    assert_eq!(adc.config.chip_select, Some(GpioPin(5)));
    assert_eq!(adc.config.mode, SpiMode::Mode1);
    assert_eq!(adc.config.bus_configuration, BusConfiguration::HalfDuplex);
}

#[test]
fn missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let result = SpiMuxConfig::load_validated(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound)));
}

#[test]
fn missing_shared_section_is_parse_error() {
    let (_dir, path) = write_config("[driver]\nname = \"null\"\n");
    let result = SpiMuxConfig::load_validated(&path);
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn validation_runs_after_parse() {
    let (_dir, path) = write_config(
        r#"
[shared]
service_name = "rig"

[[devices]]
name = "a"
bus = 0
chip_select = 4
clock_rate_hz = 1000000

[[devices]]
name = "b"
bus = 0
chip_select = 4
clock_rate_hz = 2000000
"#,
    );
    let result = SpiMuxConfig::load_validated(&path);
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn empty_service_name_rejected() {
    let (_dir, path) = write_config("[shared]\nservice_name = \"\"\n");
    let result = SpiMuxConfig::load_validated(&path);
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}
