//! SPI multiplexer configuration types.
//!
//! This module contains the configuration loaded from `spimux.toml`:
//! - `SpiMuxConfig` - Top-level service configuration
//! - `DriverSection` - Which driver to load
//! - `SimulationConfig` / `SimulatedBusConfig` - Simulation driver settings
//! - `NamedDevice` - Devices opened at service start
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! log_level = "debug"
//! service_name = "spimux-bench"
//!
//! [driver]
//! name = "simulation"
//!
//! [simulation]
//! ports = [0, 1]
//!
//! [[simulation.bus]]
//! index = 0
//! clock = 14
//! miso = 12
//! mosi = 13
//!
//! [[devices]]
//! name = "display"
//! bus = 0
//! chip_select = 15
//! clock_rate_hz = 10000000
//! mode = "mode0"
//! ```

use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
use crate::spi::consts::{
    DEFAULT_CHIP_SELECT_LINES, DEFAULT_DRIVER, DEFAULT_MIN_CLOCK_HZ, MAX_DEVICES_PER_BUS,
    MAX_SPI_BUSES, SPI_SERVICE_NAME,
};
use crate::spi::types::{BusPins, DeviceConfig, GpioPin, PortMap};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Default function for the driver name
fn default_driver_name() -> String {
    DEFAULT_DRIVER.to_string()
}

/// Default function for simulated ports (two user buses)
fn default_ports() -> Vec<u8> {
    vec![0, 1]
}

/// Default function for the simulated idle line level
fn default_idle_byte() -> u8 {
    0xFF
}

/// Default function for the minimum clock
fn default_min_clock_hz() -> u32 {
    DEFAULT_MIN_CLOCK_HZ
}

/// Default function for chip-select line count
fn default_chip_select_lines() -> u32 {
    DEFAULT_CHIP_SELECT_LINES
}

/// Default simulated pin routing: bus 0 on the HSPI IOMUX pins, bus 1 on the
/// VSPI IOMUX pins.
fn default_simulated_buses() -> Vec<SimulatedBusConfig> {
    vec![
        SimulatedBusConfig::new(0, BusPins::new(14, 12, 13)),
        SimulatedBusConfig::new(1, BusPins::new(18, 19, 23)),
    ]
}

/// Main configuration loaded from `spimux.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpiMuxConfig {
    /// Logging level and instance name.
    pub shared: SharedConfig,

    /// Driver selection.
    #[serde(default)]
    pub driver: DriverSection,

    /// Settings for the simulation driver (ignored by other drivers).
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Devices opened when the service starts.
    #[serde(default)]
    pub devices: Vec<NamedDevice>,
}

/// Driver selection section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverSection {
    /// Registered driver name (e.g., "simulation", "null").
    #[serde(default = "default_driver_name")]
    pub name: String,
}

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            name: default_driver_name(),
        }
    }
}

/// Simulation driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Bus indices present on the simulated target.
    #[serde(default = "default_ports")]
    pub ports: Vec<u8>,

    /// Byte returned when no device drives MISO.
    #[serde(default = "default_idle_byte")]
    pub idle_byte: u8,

    /// Per-bus pin routing and clock limits.
    #[serde(default = "default_simulated_buses", rename = "bus")]
    pub buses: Vec<SimulatedBusConfig>,

    /// Pins already held by other consumers at start.
    #[serde(default)]
    pub busy_pins: Vec<GpioPin>,

    /// Buses whose hardware initialization fails.
    #[serde(default)]
    pub fail_bus_init: Vec<u8>,
}

impl SimulationConfig {
    /// Port bitmap built from `ports`.
    pub fn port_map(&self) -> PortMap {
        PortMap::from_buses(self.ports.iter().copied())
    }

    /// Settings for `bus`, if configured.
    pub fn bus(&self, bus: u8) -> Option<&SimulatedBusConfig> {
        self.buses.iter().find(|b| b.index == bus)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ports: default_ports(),
            idle_byte: default_idle_byte(),
            buses: default_simulated_buses(),
            busy_pins: Vec::new(),
            fail_bus_init: Vec::new(),
        }
    }
}

/// Simulated bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedBusConfig {
    /// Bus index.
    pub index: u8,

    /// Clock/MISO/MOSI routing.
    #[serde(flatten)]
    pub pins: BusPins,

    /// Lowest configurable clock in Hz.
    #[serde(default = "default_min_clock_hz")]
    pub min_clock_hz: u32,

    /// Highest configurable clock in Hz. Derived from the pin routing when
    /// omitted.
    #[serde(default)]
    pub max_clock_hz: Option<u32>,

    /// Hardware chip-select lines.
    #[serde(default = "default_chip_select_lines")]
    pub chip_select_lines: u32,
}

impl SimulatedBusConfig {
    /// Bus with default clock limits.
    pub fn new(index: u8, pins: BusPins) -> Self {
        Self {
            index,
            pins,
            min_clock_hz: default_min_clock_hz(),
            max_clock_hz: None,
            chip_select_lines: default_chip_select_lines(),
        }
    }
}

/// A device opened at service start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedDevice {
    /// Unique device name (for logging and reports).
    pub name: String,

    /// Device configuration.
    #[serde(flatten)]
    pub config: DeviceConfig,
}

impl Default for SpiMuxConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig {
                log_level: LogLevel::default(),
                service_name: SPI_SERVICE_NAME.to_string(),
            },
            driver: DriverSection::default(),
            simulation: SimulationConfig::default(),
            devices: Vec::new(),
        }
    }
}

impl SpiMuxConfig {
    /// Load and validate a configuration file.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        debug!(
            "Loaded {:?}: driver={}, {} device(s)",
            path,
            config.driver.name,
            config.devices.len()
        );
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Validation Rules
    /// 1. `shared.service_name` not empty
    /// 2. `driver.name` not empty
    /// 3. Simulated ports below `MAX_SPI_BUSES`, simulated bus entries unique
    ///    and present in `ports`, `min_clock_hz <= max_clock_hz`
    /// 4. Device names non-empty and unique
    /// 5. Device bus below `MAX_SPI_BUSES`
    /// 6. At most `MAX_DEVICES_PER_BUS` devices per bus
    /// 7. Chip-selects unique per bus
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.driver.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "driver.name cannot be empty".to_string(),
            ));
        }

        self.validate_simulation()?;
        self.validate_devices()
    }

    fn validate_simulation(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;

        if let Some(port) = sim.ports.iter().find(|p| usize::from(**p) >= MAX_SPI_BUSES) {
            return Err(ConfigError::ValidationError(format!(
                "Simulated port {} out of range (max {})",
                port,
                MAX_SPI_BUSES - 1
            )));
        }

        let mut seen = HashSet::new();
        for bus in &sim.buses {
            if !seen.insert(bus.index) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate simulated bus {}",
                    bus.index
                )));
            }
            if !sim.ports.contains(&bus.index) {
                return Err(ConfigError::ValidationError(format!(
                    "Simulated bus {} is not listed in ports",
                    bus.index
                )));
            }
            if bus.max_clock_hz.is_some_and(|max| max < bus.min_clock_hz) {
                return Err(ConfigError::ValidationError(format!(
                    "Simulated bus {}: max_clock_hz {:?} below min_clock_hz {}",
                    bus.index, bus.max_clock_hz, bus.min_clock_hz
                )));
            }
        }

        Ok(())
    }

    fn validate_devices(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        let mut per_bus: HashMap<u8, Vec<Option<GpioPin>>> = HashMap::new();

        for device in &self.devices {
            if device.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "Device name cannot be empty".to_string(),
                ));
            }
            if !names.insert(device.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate device name: {}",
                    device.name
                )));
            }

            let bus = device.config.bus;
            if usize::from(bus) >= MAX_SPI_BUSES {
                return Err(ConfigError::ValidationError(format!(
                    "Device {}: bus {} out of range (max {})",
                    device.name,
                    bus,
                    MAX_SPI_BUSES - 1
                )));
            }

            let selects = per_bus.entry(bus).or_default();
            if selects.contains(&device.config.chip_select) {
                return Err(ConfigError::ValidationError(format!(
                    "Device {}: chip select {:?} already used on bus {}",
                    device.name, device.config.chip_select, bus
                )));
            }
            selects.push(device.config.chip_select);

            if selects.len() > MAX_DEVICES_PER_BUS {
                return Err(ConfigError::ValidationError(format!(
                    "Too many devices on bus {}: {} (max {})",
                    bus,
                    selects.len(),
                    MAX_DEVICES_PER_BUS
                )));
            }
        }

        Ok(())
    }
}
