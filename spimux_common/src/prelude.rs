//! Prelude module for common re-exports.
//!
//! ```rust
//! use spimux_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::spi::config::{NamedDevice, SpiMuxConfig};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::spi::consts::{MAX_DEVICES_PER_BUS, MAX_SPI_BUSES};

// ─── Core vocabulary ────────────────────────────────────────────────
pub use crate::spi::driver::{DriverError, DriverFactory, SpiDriver};
pub use crate::spi::error::{SpiError, SpiErrorKind};
pub use crate::spi::handle::{DeviceHandle, HandleParts};
pub use crate::spi::types::{
    BitOrder, BusConfiguration, BusInfo, BusPins, DeviceConfig, DriverHandle, GpioPin, OpStatus,
    PortMap, SpiMode, WriteReadSettings,
};
