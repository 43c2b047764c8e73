//! GPIO reservation table and pin routing rules for the simulation driver.
//!
//! Pins are either free or reserved. Pins listed as busy in the configuration
//! start out reserved, standing in for other peripherals on the target.

use spimux_common::spi::types::{BusPins, GpioPin};
use std::collections::BTreeSet;
use tracing::trace;

/// Highest clock when a bus uses its dedicated IOMUX pins.
pub const IOMUX_MAX_CLOCK_HZ: u32 = 80_000_000;

/// Highest clock when a bus is routed through the GPIO matrix.
pub const MATRIX_MAX_CLOCK_HZ: u32 = 40_000_000;

/// Dedicated pin sets (HSPI, VSPI).
pub const IOMUX_PIN_SETS: [BusPins; 2] = [BusPins::new(14, 12, 13), BusPins::new(18, 19, 23)];

/// True when `pins` is one of the dedicated IOMUX sets.
pub fn uses_iomux(pins: &BusPins) -> bool {
    IOMUX_PIN_SETS.contains(pins)
}

/// Maximum clock implied by the pin routing.
pub fn routed_max_clock(pins: &BusPins) -> u32 {
    if uses_iomux(pins) {
        IOMUX_MAX_CLOCK_HZ
    } else {
        MATRIX_MAX_CLOCK_HZ
    }
}

/// Reservation state of every pin.
#[derive(Debug, Clone, Default)]
pub struct GpioTable {
    reserved: BTreeSet<GpioPin>,
}

impl GpioTable {
    /// Table with `busy` pins already reserved.
    pub fn new<I: IntoIterator<Item = GpioPin>>(busy: I) -> Self {
        Self {
            reserved: busy.into_iter().collect(),
        }
    }

    /// True if the pin is reserved.
    pub fn is_reserved(&self, pin: GpioPin) -> bool {
        self.reserved.contains(&pin)
    }

    /// Reserve a pin. Returns false if it was already reserved.
    pub fn reserve(&mut self, pin: GpioPin) -> bool {
        let claimed = self.reserved.insert(pin);
        trace!("{} reserve -> {}", pin, claimed);
        claimed
    }

    /// Release a pin. Releasing a free pin is a no-op.
    pub fn release(&mut self, pin: GpioPin) {
        self.reserved.remove(&pin);
        trace!("{} released", pin);
    }

    /// Number of reserved pins.
    pub fn reserved_count(&self) -> usize {
        self.reserved.len()
    }

    /// Reserved pins, ascending.
    pub fn reserved(&self) -> impl Iterator<Item = GpioPin> + '_ {
        self.reserved.iter().copied()
    }
}
