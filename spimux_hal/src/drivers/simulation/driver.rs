//! Simulation driver implementation.
//!
//! The `SimulationDriver` implements the `SpiDriver` trait with an in-memory
//! target: configurable buses and pin routing, a GPIO reservation table, and
//! a loopback wire between MOSI and MISO on every bus.

use super::gpio::{routed_max_clock, GpioTable};
use serde::Serialize;
use spimux_common::spi::config::{SimulatedBusConfig, SimulationConfig, SpiMuxConfig};
use spimux_common::spi::driver::{DriverDiagnostics, DriverError, SpiDriver};
use spimux_common::spi::consts::{
    DEFAULT_CHIP_SELECT_LINES, DEFAULT_MAX_CLOCK_HZ, DEFAULT_MIN_CLOCK_HZ,
};
use spimux_common::spi::types::{
    BusPins, DeviceConfig, DriverHandle, GpioPin, OpStatus, PortMap, WriteReadSettings,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, trace, warn};

/// A device added to a simulated bus.
#[derive(Debug, Clone)]
struct SimDevice {
    config: DeviceConfig,
    last_status: OpStatus,
}

/// Transfer counters.
#[derive(Debug, Clone, Copy, Default)]
struct TransferStats {
    transfers: u64,
    bytes_written: u64,
    bytes_read: u64,
    /// Bytes clocked on the wire, including discarded read-phase bytes
    bytes_clocked: u64,
}

/// Driver-specific part of the diagnostics report.
#[derive(Serialize)]
struct SimulationDiagnostics<'a> {
    powered_buses: Vec<u8>,
    reserved_pins: Vec<GpioPin>,
    bytes_clocked: u64,
    idle_byte: u8,
    fail_bus_init: &'a BTreeSet<u8>,
}

/// Simulation driver implementing the SpiDriver trait.
pub struct SimulationDriver {
    /// Driver name
    name: &'static str,
    /// Driver version
    version: &'static str,
    /// Buses present on the simulated target
    ports: PortMap,
    /// Per-bus routing and limits
    buses: BTreeMap<u8, SimulatedBusConfig>,
    /// Buses that refuse to come up
    fail_bus_init: BTreeSet<u8>,
    /// Buses currently initialized
    powered: BTreeSet<u8>,
    /// Byte read when nothing drives MISO
    idle_byte: u8,
    /// Pin reservation state
    gpio: GpioTable,
    /// Added devices
    devices: BTreeMap<DriverHandle, SimDevice>,
    /// Next driver handle to hand out
    next_handle: u32,
    /// Transfer counters
    stats: TransferStats,
}

impl SimulationDriver {
    /// Create a simulation driver with the default target (two buses on the
    /// dedicated pin sets).
    pub fn new() -> Self {
        Self::with_config(&SimulationConfig::default())
    }

    /// Create a simulation driver for the given target.
    pub fn with_config(config: &SimulationConfig) -> Self {
        let mut driver = Self {
            name: super::DRIVER_NAME,
            version: env!("CARGO_PKG_VERSION"),
            ports: PortMap::empty(),
            buses: BTreeMap::new(),
            fail_bus_init: BTreeSet::new(),
            powered: BTreeSet::new(),
            idle_byte: 0,
            gpio: GpioTable::default(),
            devices: BTreeMap::new(),
            next_handle: 1,
            stats: TransferStats::default(),
        };
        driver.configure(config);
        driver
    }

    /// Replace the target description and drop all runtime state.
    fn configure(&mut self, config: &SimulationConfig) {
        self.ports = config.port_map();
        self.buses = config
            .buses
            .iter()
            .map(|bus| (bus.index, bus.clone()))
            .collect();
        self.fail_bus_init = config.fail_bus_init.iter().copied().collect();
        self.idle_byte = config.idle_byte;
        self.gpio = GpioTable::new(config.busy_pins.iter().copied());
        self.powered.clear();
        self.devices.clear();
        self.next_handle = 1;
        self.stats = TransferStats::default();
    }

    /// True while the bus is initialized.
    pub fn is_bus_powered(&self, bus: u8) -> bool {
        self.powered.contains(&bus)
    }

    /// Number of devices added on `bus`.
    pub fn device_count(&self, bus: u8) -> usize {
        self.devices
            .values()
            .filter(|device| device.config.bus == bus)
            .count()
    }

    fn allocate_handle(&mut self) -> Result<DriverHandle, DriverError> {
        let handle = DriverHandle::new(self.next_handle).ok_or(DriverError::OutOfMemory)?;
        self.next_handle = self.next_handle.checked_add(1).unwrap_or(1);
        Ok(handle)
    }

    /// Clock out `write` and fill `read` as the wire would.
    ///
    /// MOSI is looped back to MISO. In full duplex the read buffer receives
    /// what is written in the same clock, and the idle byte beyond the end of
    /// the write buffer. In half duplex MISO is sampled only after the write
    /// phase, when nothing drives it.
    fn clock_transfer(&self, settings: &WriteReadSettings, write: &[u8], read: &mut [u8]) -> u64 {
        if settings.full_duplex {
            for (idx, byte) in read.iter_mut().enumerate() {
                *byte = write.get(idx).copied().unwrap_or(self.idle_byte);
            }
            return write.len().max(read.len()) as u64;
        }

        let element: u64 = if settings.data16 { 2 } else { 1 };
        let skipped = if read.is_empty() {
            0
        } else {
            (settings.read_offset as u64).saturating_mul(element)
        };
        read.fill(self.idle_byte);
        (write.len() as u64)
            .saturating_add(skipped)
            .saturating_add(read.len() as u64)
    }

    fn bus_config(&self, bus: u8) -> Option<&SimulatedBusConfig> {
        self.buses.get(&bus)
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SpiDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> &'static str {
        self.version
    }

    fn init(&mut self, config: &SpiMuxConfig) -> Result<(), DriverError> {
        let sim = &config.simulation;
        if let Some(bus) = sim.buses.iter().find(|bus| !sim.ports.contains(&bus.index)) {
            return Err(DriverError::ConfigError(format!(
                "Simulated bus {} is not listed in ports",
                bus.index
            )));
        }

        self.configure(sim);
        info!(
            "Initializing simulation driver with ports {:?}, {} routed bus(es), {} busy pin(s)",
            sim.ports,
            sim.buses.len(),
            sim.busy_pins.len()
        );
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), DriverError> {
        info!("Shutting down simulation driver");
        if !self.devices.is_empty() {
            warn!("{} device(s) still added at shutdown", self.devices.len());
        }
        self.devices.clear();
        self.powered.clear();
        Ok(())
    }

    fn ports_map(&self) -> PortMap {
        self.ports
    }

    fn initialize_bus(&mut self, bus: u8) -> Result<(), DriverError> {
        if !self.ports.has_bus(bus) {
            return Err(DriverError::InvalidArgument(format!("no SPI bus {bus}")));
        }
        if self.fail_bus_init.contains(&bus) {
            return Err(DriverError::Hardware(format!("bus {bus} failed to initialize")));
        }
        let pins = self.bus_pins(bus);
        if !pins.is_complete() {
            return Err(DriverError::ConfigError(format!(
                "bus {bus} pins not fully routed: {pins:?}"
            )));
        }

        self.powered.insert(bus);
        debug!("Simulated bus {} up at max {} Hz", bus, self.max_clock_frequency(bus));
        Ok(())
    }

    fn uninitialize_bus(&mut self, bus: u8) {
        if self.powered.remove(&bus) {
            debug!("Simulated bus {} down", bus);
        }
    }

    fn add_device(&mut self, config: &DeviceConfig) -> Result<DriverHandle, DriverError> {
        let bus = config.bus;
        if !self.is_bus_powered(bus) {
            return Err(DriverError::InvalidArgument(format!(
                "bus {bus} is not initialized"
            )));
        }

        let min_clock = self.min_clock_frequency(bus);
        if config.clock_rate_hz != 0 && config.clock_rate_hz < min_clock {
            return Err(DriverError::InvalidArgument(format!(
                "clock {} Hz below bus minimum {} Hz",
                config.clock_rate_hz, min_clock
            )));
        }

        let lines = self.chip_select_line_count(bus);
        if self.device_count(bus) >= lines as usize {
            return Err(DriverError::Hardware(format!(
                "all {lines} chip-select lines on bus {bus} in use"
            )));
        }

        let handle = self.allocate_handle()?;
        self.devices.insert(
            handle,
            SimDevice {
                config: *config,
                last_status: OpStatus::Complete,
            },
        );
        debug!("Simulated device {} added on bus {}", handle, bus);
        Ok(handle)
    }

    fn remove_device(&mut self, handle: DriverHandle) -> Result<(), DriverError> {
        self.devices
            .remove(&handle)
            .map(|_| debug!("Simulated device {} removed", handle))
            .ok_or_else(|| DriverError::InvalidArgument(format!("unknown device {handle}")))
    }

    fn operation_status(&self, handle: DriverHandle) -> OpStatus {
        self.devices
            .get(&handle)
            .map_or(OpStatus::Error, |device| device.last_status)
    }

    fn write_read(
        &mut self,
        handle: DriverHandle,
        _config: &DeviceConfig,
        settings: &WriteReadSettings,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<OpStatus, DriverError> {
        let bus = self
            .devices
            .get(&handle)
            .map(|device| device.config.bus)
            .ok_or_else(|| DriverError::InvalidArgument(format!("unknown device {handle}")))?;

        if !self.is_bus_powered(bus) {
            if let Some(device) = self.devices.get_mut(&handle) {
                device.last_status = OpStatus::Error;
            }
            return Err(DriverError::Hardware(format!("bus {bus} is not initialized")));
        }

        let clocked = self.clock_transfer(settings, write, read);
        self.stats.transfers += 1;
        self.stats.bytes_written += write.len() as u64;
        self.stats.bytes_read += read.len() as u64;
        self.stats.bytes_clocked = self.stats.bytes_clocked.saturating_add(clocked);
        if let Some(device) = self.devices.get_mut(&handle) {
            device.last_status = OpStatus::Complete;
        }

        trace!(
            "Simulated transfer on {}: {} out, {} in, {} clocked",
            handle,
            write.len(),
            read.len(),
            clocked
        );
        Ok(OpStatus::Complete)
    }

    fn bus_pins(&self, bus: u8) -> BusPins {
        self.bus_config(bus).map_or(BusPins::NONE, |cfg| cfg.pins)
    }

    fn pin_is_busy(&self, pin: GpioPin) -> bool {
        self.gpio.is_reserved(pin)
    }

    fn reserve_pin(&mut self, pin: GpioPin, reserve: bool) -> Result<(), DriverError> {
        if !reserve {
            self.gpio.release(pin);
            return Ok(());
        }
        if self.gpio.reserve(pin) {
            Ok(())
        } else {
            Err(DriverError::InvalidArgument(format!("{pin} already reserved")))
        }
    }

    fn min_clock_frequency(&self, bus: u8) -> u32 {
        self.bus_config(bus)
            .map_or(DEFAULT_MIN_CLOCK_HZ, |cfg| cfg.min_clock_hz)
    }

    fn max_clock_frequency(&self, bus: u8) -> u32 {
        self.bus_config(bus).map_or(DEFAULT_MAX_CLOCK_HZ, |cfg| {
            cfg.max_clock_hz.unwrap_or_else(|| routed_max_clock(&cfg.pins))
        })
    }

    fn chip_select_line_count(&self, bus: u8) -> u32 {
        self.bus_config(bus)
            .map_or(DEFAULT_CHIP_SELECT_LINES, |cfg| cfg.chip_select_lines)
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        let custom = SimulationDiagnostics {
            powered_buses: self.powered.iter().copied().collect(),
            reserved_pins: self.gpio.reserved().collect(),
            bytes_clocked: self.stats.bytes_clocked,
            idle_byte: self.idle_byte,
            fail_bus_init: &self.fail_bus_init,
        };

        Some(DriverDiagnostics {
            transfers: self.stats.transfers,
            bytes_written: self.stats.bytes_written,
            bytes_read: self.stats.bytes_read,
            devices: self.devices.len(),
            reserved_pins: self.gpio.reserved_count(),
            custom: serde_json::to_string(&custom).ok(),
        })
    }
}
