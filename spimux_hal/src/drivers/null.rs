//! Null driver.
//!
//! Relies on the trait defaults for every optional capability: buses come up
//! without pins, devices are accepted, reservations always succeed. Transfers
//! read back zeros.

use spimux_common::spi::driver::{DriverError, SpiDriver};
use spimux_common::spi::types::{DeviceConfig, DriverHandle, OpStatus, PortMap, WriteReadSettings};
use tracing::trace;

/// Registered name of the null driver.
pub const DRIVER_NAME: &str = "null";

/// Driver with no hardware behind it.
#[derive(Debug, Clone)]
pub struct NullDriver {
    ports: PortMap,
}

impl NullDriver {
    /// Two buses, 0 and 1.
    pub fn new() -> Self {
        Self::with_ports(PortMap::BUS0 | PortMap::BUS1)
    }

    /// Custom port map.
    pub fn with_ports(ports: PortMap) -> Self {
        Self { ports }
    }
}

impl Default for NullDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SpiDriver for NullDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn ports_map(&self) -> PortMap {
        self.ports
    }

    fn write_read(
        &mut self,
        handle: DriverHandle,
        _config: &DeviceConfig,
        _settings: &WriteReadSettings,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<OpStatus, DriverError> {
        trace!("null {}: discarding {} byte(s)", handle, write.len());
        read.fill(0);
        Ok(OpStatus::Complete)
    }
}

/// Factory function to create a null driver instance.
pub fn create_driver() -> Box<dyn SpiDriver> {
    Box::new(NullDriver::new())
}
