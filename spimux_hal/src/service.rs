//! Service wiring: configuration to driver to core.
//!
//! `SpiService` creates the configured driver from a [`DriverRegistry`],
//! initializes it, wraps it in a [`SpiCore`] and opens every device listed in
//! the configuration.

use serde::Serialize;
use spimux_common::spi::config::SpiMuxConfig;
use spimux_common::spi::driver::DriverError;
use spimux_common::spi::error::SpiError;
use spimux_common::spi::handle::DeviceHandle;
use spimux_common::spi::types::{OpStatus, WriteReadSettings};
use thiserror::Error;
use tracing::{info, warn};

use crate::core::SpiCore;
use crate::driver_registry::DriverRegistry;
use crate::report::CoreReport;

/// Pattern clocked out by [`SpiService::probe`].
pub const PROBE_PATTERN: [u8; 4] = [0xA5, 0x5A, 0x00, 0xFF];

/// Errors raised while starting or running the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Driver could not be created, initialized or shut down
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// A configured device could not be opened
    #[error("Failed to open device '{name}': {source}")]
    OpenDevice {
        /// Device name from the configuration
        name: String,
        /// Core error
        source: SpiError,
    },

    /// A probe transfer failed
    #[error("Probe of device '{name}' failed: {source}")]
    Probe {
        /// Device name from the configuration
        name: String,
        /// Core error
        source: SpiError,
    },
}

/// A configured device opened at startup.
#[derive(Debug, Clone, Serialize)]
pub struct NamedHandle {
    /// Device name
    pub name: String,
    /// Handle returned by the core
    pub handle: DeviceHandle,
}

/// Outcome of a loopback probe on one device.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    /// Device name
    pub name: String,
    /// Device handle
    pub handle: DeviceHandle,
    /// Status reported by the driver
    pub status: OpStatus,
    /// Bytes read back
    pub response: Vec<u8>,
    /// Response equals the pattern written
    pub loopback: bool,
}

/// Running service.
pub struct SpiService {
    core: SpiCore,
    devices: Vec<NamedHandle>,
}

impl SpiService {
    /// Create and initialize the configured driver, then open the configured
    /// devices in order.
    ///
    /// # Errors
    /// - `ServiceError::Driver` if the driver is unknown or its init fails
    /// - `ServiceError::OpenDevice` if a device cannot be opened; devices
    ///   opened before it are closed again
    pub fn start(config: &SpiMuxConfig, registry: &DriverRegistry) -> Result<Self, ServiceError> {
        info!(
            "Starting {} with driver '{}'",
            config.shared.service_name, config.driver.name
        );

        let mut driver = registry.create_driver(&config.driver.name)?;
        info!("Created driver: {} v{}", driver.name(), driver.version());
        driver.init(config)?;

        let mut service = Self {
            core: SpiCore::new(driver),
            devices: Vec::with_capacity(config.devices.len()),
        };

        for device in &config.devices {
            match service.core.open_device(&device.config) {
                Ok(handle) => {
                    info!("Device '{}' -> {}", device.name, handle);
                    service.devices.push(NamedHandle {
                        name: device.name.clone(),
                        handle,
                    });
                }
                Err(source) => {
                    if let Err(e) = service.core.shutdown() {
                        warn!("Driver shutdown after failed start: {}", e);
                    }
                    return Err(ServiceError::OpenDevice {
                        name: device.name.clone(),
                        source,
                    });
                }
            }
        }

        info!("{} device(s) open", service.devices.len());
        Ok(service)
    }

    /// Devices opened from the configuration.
    pub fn devices(&self) -> &[NamedHandle] {
        &self.devices
    }

    /// Handle of a configured device by name.
    pub fn handle(&self, name: &str) -> Option<DeviceHandle> {
        self.devices
            .iter()
            .find(|device| device.name == name)
            .map(|device| device.handle)
    }

    /// The underlying core.
    pub fn core(&self) -> &SpiCore {
        &self.core
    }

    /// The underlying core, mutably.
    pub fn core_mut(&mut self) -> &mut SpiCore {
        &mut self.core
    }

    /// Full-duplex transfer of [`PROBE_PATTERN`] on every configured device.
    pub fn probe(&mut self) -> Result<Vec<ProbeResult>, ServiceError> {
        let mut results = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            let mut response = vec![0u8; PROBE_PATTERN.len()];
            let status = self
                .core
                .write_read(
                    device.handle,
                    &WriteReadSettings::FULL_DUPLEX,
                    &PROBE_PATTERN,
                    &mut response,
                )
                .map_err(|source| ServiceError::Probe {
                    name: device.name.clone(),
                    source,
                })?;

            let loopback = response == PROBE_PATTERN;
            info!(
                "Probe '{}': status={:?}, response={:02X?}, loopback={}",
                device.name, status, response, loopback
            );
            results.push(ProbeResult {
                name: device.name.clone(),
                handle: device.handle,
                status,
                response,
                loopback,
            });
        }
        Ok(results)
    }

    /// Snapshot of the core state.
    pub fn report(&self) -> CoreReport {
        self.core.report()
    }

    /// Close every device and shut the driver down.
    pub fn stop(mut self) -> Result<(), ServiceError> {
        self.devices.clear();
        self.core.shutdown()?;
        info!("Service stopped");
        Ok(())
    }
}
