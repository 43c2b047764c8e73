//! Serializable snapshot of the core state.

use serde::Serialize;
use spimux_common::spi::driver::DriverDiagnostics;
use spimux_common::spi::handle::DeviceHandle;
use spimux_common::spi::types::{BusInfo, DeviceConfig, DriverHandle};

/// Core state across all available buses.
#[derive(Debug, Clone, Serialize)]
pub struct CoreReport {
    /// Driver name
    pub driver: String,
    /// Driver version
    pub version: String,
    /// One entry per bus in the driver's port map
    pub buses: Vec<BusReport>,
    /// Driver diagnostics, if the driver provides them
    pub diagnostics: Option<DriverDiagnostics>,
}

/// State of one bus.
#[derive(Debug, Clone, Serialize)]
pub struct BusReport {
    /// Capabilities reported by the driver
    pub info: BusInfo,
    /// Bus brought up and pins reserved
    pub initialized: bool,
    /// Open devices
    pub devices_in_use: usize,
    /// Milliseconds per byte for the most recently opened device
    pub byte_time_ms: f64,
    /// Open devices, ascending slot order
    pub devices: Vec<DeviceReport>,
}

/// One open device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    /// Caller-facing handle
    pub handle: DeviceHandle,
    /// Slot index on the bus
    pub slot: u8,
    /// Identity assigned by the driver
    pub driver_handle: DriverHandle,
    /// Configuration the device was opened with
    pub config: DeviceConfig,
}
