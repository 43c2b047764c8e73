//! SPI driver trait and error types.
//!
//! This module defines:
//! - `SpiDriver` trait - Capability interface the SPI core calls into
//! - `DriverError` enum - Error types reported by drivers
//! - `DriverFactory` type alias - Factory function type
//! - `DriverDiagnostics` struct - Optional driver diagnostics

use crate::spi::config::SpiMuxConfig;
use crate::spi::consts::{DEFAULT_CHIP_SELECT_LINES, DEFAULT_MAX_CLOCK_HZ, DEFAULT_MIN_CLOCK_HZ};
use crate::spi::types::{
    BusPins, DeviceConfig, DriverHandle, GpioPin, OpStatus, PortMap, WriteReadSettings,
};
use serde::Serialize;
use thiserror::Error;

/// Error types for driver operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Argument rejected by the driver
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Hardware communication error
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Transfer buffer could not be allocated
    #[error("Out of memory")]
    OutOfMemory,

    /// Operation not provided by this driver
    #[error("Not supported: {0}")]
    Unsupported(String),
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn SpiDriver>;

/// Optional driver diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriverDiagnostics {
    /// Number of write/read operations executed
    pub transfers: u64,
    /// Bytes clocked out
    pub bytes_written: u64,
    /// Bytes delivered to read buffers
    pub bytes_read: u64,
    /// Devices currently added
    pub devices: usize,
    /// Pins currently reserved
    pub reserved_pins: usize,
    /// Driver-specific diagnostics (JSON string)
    pub custom: Option<String>,
}

/// Capability interface between the SPI core and a hardware backend.
///
/// Only [`ports_map`](SpiDriver::ports_map) and
/// [`write_read`](SpiDriver::write_read) are mandatory. Every other method has
/// a default that succeeds trivially, so a backend lacking a capability (no
/// pin muxing, no bus power control, synchronous transfers only) does not
/// need to implement it.
///
/// # Lifecycle
///
/// 1. `init()` - Called once after the driver is created
/// 2. `initialize_bus()` / `add_device()` / `write_read()` / ... - Called by
///    the core while devices are open
/// 3. `shutdown()` - Called after the core has closed every device
///
/// # Handles
///
/// `add_device` returns a [`DriverHandle`], which cannot be zero. The core
/// uses the absence of a handle to mark a free slot.
pub trait SpiDriver: Send + Sync {
    /// Returns the driver's unique identifier (e.g., "simulation", "null").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str;

    /// Initialize the driver from the service configuration.
    fn init(&mut self, _config: &SpiMuxConfig) -> Result<(), DriverError> {
        Ok(())
    }

    /// Release driver resources.
    fn shutdown(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    /// Bitmap of buses present on the target.
    fn ports_map(&self) -> PortMap;

    /// Number of buses present.
    fn ports_count(&self) -> usize {
        self.ports_map().count()
    }

    /// Bring up the bus hardware.
    fn initialize_bus(&mut self, _bus: u8) -> Result<(), DriverError> {
        Ok(())
    }

    /// Power down the bus hardware. Errors are not reported.
    fn uninitialize_bus(&mut self, _bus: u8) {}

    /// Register a device on its bus and return its identity.
    fn add_device(&mut self, _config: &DeviceConfig) -> Result<DriverHandle, DriverError> {
        Ok(DriverHandle::FIRST)
    }

    /// Unregister a device.
    fn remove_device(&mut self, _handle: DriverHandle) -> Result<(), DriverError> {
        Ok(())
    }

    /// Status of the last operation started on the device.
    fn operation_status(&self, _handle: DriverHandle) -> OpStatus {
        OpStatus::Complete
    }

    /// Write `write` and read into `read` on the device.
    ///
    /// With `settings.full_duplex` both phases share the clock and the
    /// transfer length is the longer buffer. Otherwise the write phase is
    /// clocked first and `settings.read_offset` elements of the read phase are
    /// discarded.
    fn write_read(
        &mut self,
        handle: DriverHandle,
        config: &DeviceConfig,
        settings: &WriteReadSettings,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<OpStatus, DriverError>;

    /// 16-bit variant of [`write_read`](SpiDriver::write_read).
    ///
    /// The default packs words little-endian and forwards with
    /// `settings.data16` set.
    fn write16_read16(
        &mut self,
        handle: DriverHandle,
        config: &DeviceConfig,
        settings: &WriteReadSettings,
        write: &[u16],
        read: &mut [u16],
    ) -> Result<OpStatus, DriverError> {
        let settings = WriteReadSettings {
            data16: true,
            ..*settings
        };
        let write_bytes: Vec<u8> = write.iter().flat_map(|w| w.to_le_bytes()).collect();
        let mut read_bytes = vec![0u8; read.len() * 2];

        let status = self.write_read(handle, config, &settings, &write_bytes, &mut read_bytes)?;

        for (word, bytes) in read.iter_mut().zip(read_bytes.chunks_exact(2)) {
            *word = u16::from_le_bytes([bytes[0], bytes[1]]);
        }
        Ok(status)
    }

    /// Clock, MISO and MOSI pins of the bus.
    fn bus_pins(&self, _bus: u8) -> BusPins {
        BusPins::NONE
    }

    /// True if another consumer holds the pin.
    fn pin_is_busy(&self, _pin: GpioPin) -> bool {
        false
    }

    /// Reserve (`true`) or release (`false`) a pin.
    fn reserve_pin(&mut self, _pin: GpioPin, _reserve: bool) -> Result<(), DriverError> {
        Ok(())
    }

    /// Lowest configurable clock on the bus.
    fn min_clock_frequency(&self, _bus: u8) -> u32 {
        DEFAULT_MIN_CLOCK_HZ
    }

    /// Highest configurable clock on the bus.
    fn max_clock_frequency(&self, _bus: u8) -> u32 {
        DEFAULT_MAX_CLOCK_HZ
    }

    /// Hardware chip-select lines on the bus.
    fn chip_select_line_count(&self, _bus: u8) -> u32 {
        DEFAULT_CHIP_SELECT_LINES
    }

    /// Get driver-specific diagnostics.
    /// Default: None
    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        None
    }
}
