//! SpiCore integration tests against the simulation driver.
//!
//! Covers bus bring-up and teardown with real pin bookkeeping, slot
//! exhaustion, chip-select conflicts and loopback transfers.

use spimux_common::spi::config::SimulationConfig;
use spimux_common::spi::consts::MAX_DEVICES_PER_BUS;
use spimux_common::spi::error::{SpiError, SpiErrorKind};
use spimux_common::spi::types::{BusPins, DeviceConfig, GpioPin, OpStatus, WriteReadSettings};
use spimux_hal::drivers::simulation::SimulationDriver;
use spimux_hal::SpiCore;

/// Helper: core over a simulated target.
fn sim_core(config: &SimulationConfig) -> SpiCore {
    SpiCore::new(Box::new(SimulationDriver::with_config(config)))
}

/// Helper: default target with `lines` chip-select lines on every bus.
fn target_with_lines(lines: u32) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    for bus in &mut config.buses {
        bus.chip_select_lines = lines;
    }
    config
}

fn busy(core: &SpiCore, pins: &[u16]) -> Vec<bool> {
    pins.iter()
        .map(|pin| core.driver().pin_is_busy(GpioPin(*pin)))
        .collect()
}

#[test]
fn test_bus_pins_follow_device_lifetime() {
    let mut core = sim_core(&SimulationConfig::default());
    assert_eq!(busy(&core, &[14, 12, 13, 15]), vec![false; 4]);

    let handle = core
        .open_device(&DeviceConfig::new(0, 15, 10_000_000))
        .expect("open");
    assert_eq!(busy(&core, &[14, 12, 13, 15]), vec![true; 4]);
    assert!(core.is_bus_initialized(0));

    core.close_device(handle).expect("close");
    assert_eq!(busy(&core, &[14, 12, 13, 15]), vec![false; 4]);
    assert!(!core.is_bus_initialized(0));

    core.open_device(&DeviceConfig::new(0, 15, 10_000_000))
        .expect("reopen");
    assert_eq!(busy(&core, &[14, 12, 13, 15]), vec![true; 4]);
}

#[test]
fn test_slot_exhaustion() {
    let mut core = sim_core(&target_with_lines(8));
    for cs in 0..MAX_DEVICES_PER_BUS as u16 {
        core.open_device(&DeviceConfig::new(1, 25 + cs, 1_000_000))
            .expect("open within capacity");
    }

    let err = core
        .open_device(&DeviceConfig::new(1, 33, 1_000_000))
        .unwrap_err();
    assert_eq!(err.kind(), SpiErrorKind::ResourceExhausted);
    assert_eq!(core.devices_in_use(1), MAX_DEVICES_PER_BUS);
}

#[test]
fn test_driver_line_limit_surfaces_as_failure() {
    let mut core = sim_core(&SimulationConfig::default());
    for cs in [25, 26, 27] {
        core.open_device(&DeviceConfig::new(0, cs, 1_000_000))
            .expect("open");
    }

    let err = core
        .open_device(&DeviceConfig::new(0, 32, 1_000_000))
        .unwrap_err();
    assert!(matches!(err, SpiError::DeviceAddFailed { bus: 0, .. }));
    assert_eq!(err.kind(), SpiErrorKind::Failure);
    assert_eq!(core.devices_in_use(0), 3);
    assert!(!core.driver().pin_is_busy(GpioPin(32)));
}

#[test]
fn test_shared_bus_scenario() {
    let mut core = sim_core(&SimulationConfig::default());

    let a = core
        .open_device(&DeviceConfig::new(0, 10, 1_000_000))
        .expect("open A");
    assert_eq!(core.byte_time_estimate(a).unwrap(), 1000.0 / 1_000_000.0);

    let err = core
        .open_device(&DeviceConfig::new(0, 10, 1_000_000))
        .unwrap_err();
    assert_eq!(err.kind(), SpiErrorKind::NotSupported);

    let b = core
        .open_device(&DeviceConfig::new(0, 11, 1_000_000))
        .expect("open B");
    assert_eq!(b.slot(), 1);

    core.close_device(a).expect("close A");
    assert_eq!(core.devices_in_use(0), 1);
    assert_eq!(
        core.device_config(b).unwrap(),
        DeviceConfig::new(0, 11, 1_000_000)
    );
    assert!(!core.driver().pin_is_busy(GpioPin(10)));
    assert!(core.driver().pin_is_busy(GpioPin(11)));
}

#[test]
fn test_externally_busy_pins() {
    let config = SimulationConfig {
        busy_pins: vec![GpioPin(19), GpioPin(4)],
        ..SimulationConfig::default()
    };
    let mut core = sim_core(&config);

    let err = core
        .open_device(&DeviceConfig::new(1, 5, 1_000_000))
        .unwrap_err();
    assert_eq!(err, SpiError::PinBusy { pin: GpioPin(19) });
    assert!(!core.is_bus_initialized(1));
    assert_eq!(busy(&core, &[18, 23]), vec![false, false]);

    let err = core
        .open_device(&DeviceConfig::new(0, 4, 1_000_000))
        .unwrap_err();
    assert_eq!(err, SpiError::ChipSelectReservationFailed { bus: 0, pin: GpioPin(4) });
    assert!(!core.is_bus_initialized(0));
    assert_eq!(busy(&core, &[14, 12, 13]), vec![false; 3]);
    assert_eq!(core.driver().diagnostics().unwrap().devices, 0);
}

#[test]
fn test_unrouted_bus_fails_to_initialize() {
    let mut config = SimulationConfig::default();
    config.buses[1].pins.mosi = None;
    let mut core = sim_core(&config);

    let err = core
        .open_device(&DeviceConfig::new(1, 5, 1_000_000))
        .unwrap_err();
    assert!(matches!(err, SpiError::BusInitFailed { bus: 1, .. }));
    assert_eq!(err.kind(), SpiErrorKind::InvalidParameter);
}

#[test]
fn test_loopback_transfers() {
    let mut core = sim_core(&SimulationConfig::default());
    let handle = core
        .open_device(&DeviceConfig::new(0, 5, 8_000_000))
        .expect("open");

    let mut read = [0u8; 3];
    let status = core
        .write_read(handle, &WriteReadSettings::FULL_DUPLEX, &[0x9F, 0x01, 0x02], &mut read)
        .expect("full duplex");
    assert_eq!(status, OpStatus::Complete);
    assert_eq!(read, [0x9F, 0x01, 0x02]);

    let mut read = [0u8; 2];
    core.write_read(handle, &WriteReadSettings::HALF_DUPLEX, &[0x9F], &mut read)
        .expect("half duplex");
    assert_eq!(read, [0xFF, 0xFF]);

    let mut words = [0u16; 2];
    core.write16_read16(handle, &WriteReadSettings::FULL_DUPLEX, &[0x1234, 0x5678], &mut words)
        .expect("16-bit");
    assert_eq!(words, [0x1234, 0x5678]);

    assert_eq!(core.operation_status(handle).unwrap(), OpStatus::Complete);
    let diag = core.driver().diagnostics().unwrap();
    assert_eq!(diag.transfers, 3);
    assert_eq!(diag.bytes_written, 3 + 1 + 4);
}

#[test]
fn test_zero_clock_uses_routed_maximum() {
    let mut config = SimulationConfig::default();
    config.buses[1].pins = BusPins::new(25, 26, 27);
    let mut core = sim_core(&config);

    let iomux = core.open_device(&DeviceConfig::new(0, 5, 0)).expect("bus 0");
    let matrix = core.open_device(&DeviceConfig::new(1, 4, 0)).expect("bus 1");

    assert_eq!(core.byte_time_estimate(iomux).unwrap(), 1000.0 / 80_000_000.0);
    assert_eq!(core.byte_time_estimate(matrix).unwrap(), 1000.0 / 40_000_000.0);
    assert_eq!(core.device_config(matrix).unwrap().clock_rate_hz, 0);
}

#[test]
fn test_stale_handles_rejected() {
    let mut core = sim_core(&SimulationConfig::default());
    let first = core
        .open_device(&DeviceConfig::new(0, 5, 1_000_000))
        .expect("open");
    core.close_device(first).expect("close");
    let second = core
        .open_device(&DeviceConfig::new(0, 5, 1_000_000))
        .expect("reopen");

    assert_eq!(first.slot(), second.slot());
    assert_eq!(core.close_device(first), Err(SpiError::InvalidHandle(first)));
    let mut read = [0u8; 1];
    assert!(core
        .write_read(first, &WriteReadSettings::FULL_DUPLEX, &[0], &mut read)
        .is_err());
    assert!(core.close_device(second).is_ok());
}

#[test]
fn test_stale_handle_aliases_after_generation_wrap() {
    let mut core = sim_core(&SimulationConfig::default());
    let old = core
        .open_device(&DeviceConfig::new(0, 5, 1_000_000))
        .expect("open");
    core.close_device(old).expect("close");

    for _ in 0..255 {
        let handle = core
            .open_device(&DeviceConfig::new(0, 5, 1_000_000))
            .expect("reopen");
        assert_ne!(handle, old);
        assert!(core.operation_status(old).is_err());
        core.close_device(handle).expect("close");
    }

    let current = core
        .open_device(&DeviceConfig::new(0, 5, 1_000_000))
        .expect("reopen after wrap");
    assert_eq!(current, old);
    assert_eq!(core.operation_status(old).unwrap(), OpStatus::Complete);
}

#[test]
fn test_teardown_and_report() {
    let mut core = sim_core(&SimulationConfig::default());
    let a = core.open_device(&DeviceConfig::new(0, 5, 1_000_000)).unwrap();
    core.open_device(&DeviceConfig::new(1, 4, 2_000_000)).unwrap();

    let report = core.report();
    assert_eq!(report.driver, "simulation");
    assert_eq!(report.buses.len(), 2);
    assert_eq!(report.buses[0].devices[0].handle, a);
    assert_eq!(report.buses[0].info.max_clock_hz, 80_000_000);
    assert_eq!(report.diagnostics.as_ref().map(|d| d.reserved_pins), Some(8));

    core.teardown_all();
    assert!(core.open_handles().is_empty());
    assert_eq!(core.driver().diagnostics().unwrap().reserved_pins, 0);
    assert_eq!(core.driver().diagnostics().unwrap().devices, 0);
}
