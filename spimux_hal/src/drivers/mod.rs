//! SPI driver implementations.
//!
//! - [`null`] - Every optional capability succeeds trivially
//! - [`simulation`] - Software driver with pin routing and loopback transfers
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `SpiDriver` trait from `spimux_common::spi::driver`
//! 3. Register the driver in [`register_builtin_drivers`]

pub mod null;
pub mod simulation;

use crate::driver_registry::DriverRegistry;

/// Register all built-in drivers.
pub fn register_builtin_drivers(registry: &mut DriverRegistry) {
    registry.register(simulation::DRIVER_NAME, simulation::create_driver);
    registry.register(null::DRIVER_NAME, null::create_driver);
}
