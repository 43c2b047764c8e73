//! Service startup integration tests.
//!
//! Loads configuration files from temporary paths, starts the service on the
//! built-in drivers and checks devices, probes and reports.

use spimux_common::spi::config::SpiMuxConfig;
use spimux_common::spi::driver::DriverError;
use spimux_common::spi::error::SpiErrorKind;
use spimux_common::spi::types::OpStatus;
use spimux_hal::service::PROBE_PATTERN;
use spimux_hal::{DriverRegistry, ServiceError, SpiService};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Helper: write a config file and load it.
fn load(content: &str) -> SpiMuxConfig {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write");
    file.flush().expect("flush");
    SpiMuxConfig::load_validated(file.path()).expect("valid config")
}

const TWO_DEVICES: &str = r#"
[shared]
service_name = "spimux-test"

[driver]
name = "simulation"

[[devices]]
name = "display"
bus = 0
chip_select = 15
clock_rate_hz = 10000000

[[devices]]
name = "flash"
bus = 1
chip_select = 5
clock_rate_hz = 40000000
mode = "mode3"
"#;

#[test]
fn test_start_opens_configured_devices() {
    let config = load(TWO_DEVICES);
    let registry = DriverRegistry::with_builtin_drivers();
    let service = SpiService::start(&config, &registry).expect("start");

    assert_eq!(service.devices().len(), 2);
    let display = service.handle("display").expect("display handle");
    let flash = service.handle("flash").expect("flash handle");
    assert_eq!(display.bus(), 0);
    assert_eq!(flash.bus(), 1);
    assert!(service.handle("missing").is_none());
    assert!(service.core().is_bus_initialized(0));
    assert!(service.core().is_bus_initialized(1));

    service.stop().expect("stop");
}

#[test]
fn test_probe_loops_back_on_simulation() {
    let config = load(TWO_DEVICES);
    let registry = DriverRegistry::with_builtin_drivers();
    let mut service = SpiService::start(&config, &registry).expect("start");

    let results = service.probe().expect("probe");
    assert_eq!(results.len(), 2);
    for result in &results {
        assert_eq!(result.status, OpStatus::Complete);
        assert_eq!(result.response, PROBE_PATTERN);
        assert!(result.loopback);
    }

    service.stop().expect("stop");
}

#[test]
fn test_probe_on_null_driver_reads_zeros() {
    let mut config = load(TWO_DEVICES);
    config.driver.name = "null".to_string();
    let registry = DriverRegistry::with_builtin_drivers();
    let mut service = SpiService::start(&config, &registry).expect("start");

    let results = service.probe().expect("probe");
    assert!(results.iter().all(|r| !r.loopback && r.response == [0; 4]));
    service.stop().expect("stop");
}

#[test]
fn test_report_serializes_to_json() {
    let config = load(TWO_DEVICES);
    let registry = DriverRegistry::with_builtin_drivers();
    let service = SpiService::start(&config, &registry).expect("start");

    let report = service.report();
    let json: serde_json::Value = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["driver"], "simulation");
    assert_eq!(json["buses"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["buses"][1]["devices"][0]["config"]["mode"], "mode3");
    assert_eq!(json["buses"][0]["info"]["max_clock_hz"], 80_000_000);
    assert_eq!(json["diagnostics"]["devices"], 2);

    service.stop().expect("stop");
}

#[test]
fn test_unknown_driver() {
    let mut config = load(TWO_DEVICES);
    config.driver.name = "ethercat".to_string();
    let registry = DriverRegistry::with_builtin_drivers();

    let err = SpiService::start(&config, &registry).err().expect("should fail");
    assert!(matches!(
        err,
        ServiceError::Driver(DriverError::DriverNotFound(ref name)) if name == "ethercat"
    ));
}

#[test]
fn test_failed_open_reports_device_name() {
    let config = load(
        r#"
[shared]
service_name = "spimux-test"

[simulation]
busy_pins = [5]

[[devices]]
name = "display"
bus = 0
chip_select = 15
clock_rate_hz = 10000000

[[devices]]
name = "flash"
bus = 1
chip_select = 5
clock_rate_hz = 40000000
"#,
    );
    let registry = DriverRegistry::with_builtin_drivers();

    match SpiService::start(&config, &registry) {
        Err(ServiceError::OpenDevice { name, source }) => {
            assert_eq!(name, "flash");
            assert_eq!(source.kind(), SpiErrorKind::Failure);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("start should fail"),
    }
}

#[test]
fn test_sample_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/spimux.toml");
    let config = SpiMuxConfig::load_validated(&path).expect("sample config");
    assert_eq!(config.devices.len(), 3);

    let registry = DriverRegistry::with_builtin_drivers();
    let mut service = SpiService::start(&config, &registry).expect("start");
    assert_eq!(service.core().devices_in_use(1), 2);
    assert!(service.probe().expect("probe").iter().all(|r| r.loopback));
    service.stop().expect("stop");
}
