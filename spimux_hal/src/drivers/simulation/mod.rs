//! Simulation driver module.
//!
//! This module provides a software SPI target for development and testing
//! without physical hardware.

mod driver;
mod gpio;

pub use driver::SimulationDriver;
pub use gpio::{GpioTable, IOMUX_MAX_CLOCK_HZ, IOMUX_PIN_SETS, MATRIX_MAX_CLOCK_HZ};

use spimux_common::spi::driver::SpiDriver;

/// Registered name of the simulation driver.
pub const DRIVER_NAME: &str = "simulation";

/// Factory function to create a simulation driver instance.
pub fn create_driver() -> Box<dyn SpiDriver> {
    Box::new(SimulationDriver::new())
}
