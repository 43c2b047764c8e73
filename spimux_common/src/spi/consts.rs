//! SPI multiplexer constants.
//!
//! Single source of truth for table sizes, the handle tag and default paths.

use static_assertions::const_assert;

/// Canonical service name (used for logging and the default config).
pub const SPI_SERVICE_NAME: &str = "spimux";

/// Maximum number of physical SPI buses tracked by the slot table.
pub const MAX_SPI_BUSES: usize = 4;

/// Maximum number of devices that can be open on one bus.
pub const MAX_DEVICES_PER_BUS: usize = 4;

/// Device-type tag carried in bits 16..24 of every SPI handle.
pub const DEVICE_TYPE_SPI: u8 = 0x03;

/// Lowest clock a driver reports when it does not know better (20 MHz / 256).
pub const DEFAULT_MIN_CLOCK_HZ: u32 = 20_000_000 / 256;

/// Highest clock a driver reports when it does not know better.
pub const DEFAULT_MAX_CLOCK_HZ: u32 = 40_000_000;

/// Hardware chip-select lines per bus reported by default.
pub const DEFAULT_CHIP_SELECT_LINES: u32 = 3;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/spimux/spimux.toml";

/// Driver used when neither the CLI nor the config names one.
pub const DEFAULT_DRIVER: &str = "simulation";

// Bus and slot indices are packed into one byte each.
const_assert!(MAX_SPI_BUSES > 0 && MAX_SPI_BUSES <= 256);
const_assert!(MAX_DEVICES_PER_BUS > 0 && MAX_DEVICES_PER_BUS <= 256);
