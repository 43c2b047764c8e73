//! Device handle codec.
//!
//! A [`DeviceHandle`] is the opaque `u32` handed to callers for an open
//! device. Layout, most significant byte first:
//!
//! ```text
//!  31        24 23        16 15         8 7          0
//! ┌────────────┬────────────┬────────────┬────────────┐
//! │ generation │  type tag  │ bus index  │ slot index │
//! └────────────┴────────────┴────────────┴────────────┘
//! ```
//!
//! The generation byte is bumped every time a slot is reused, so a handle
//! kept after `close` no longer matches the slot once another device takes it.
//! The byte wraps: after 256 reuses of the same slot the generation repeats
//! and a handle that old matches the current device again.
//! Decoding never looks at the slot table; the core re-checks occupancy and
//! generation itself.

use crate::spi::consts::{DEVICE_TYPE_SPI, MAX_DEVICES_PER_BUS};
use serde::{Deserialize, Serialize};
use std::fmt;

const SLOT_SHIFT: u32 = 0;
const BUS_SHIFT: u32 = 8;
const TAG_SHIFT: u32 = 16;
const GENERATION_SHIFT: u32 = 24;

/// Opaque handle identifying one open device on one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceHandle(u32);

/// Fields extracted from a well-formed handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleParts {
    /// Bus index.
    pub bus: u8,
    /// Slot index within the bus.
    pub slot: u8,
    /// Slot generation at the time the handle was minted.
    pub generation: u8,
}

impl DeviceHandle {
    /// Pack `(bus, slot, generation)` together with the SPI type tag.
    #[inline]
    pub const fn encode(bus: u8, slot: u8, generation: u8) -> Self {
        Self(
            ((generation as u32) << GENERATION_SHIFT)
                | ((DEVICE_TYPE_SPI as u32) << TAG_SHIFT)
                | ((bus as u32) << BUS_SHIFT)
                | ((slot as u32) << SLOT_SHIFT),
        )
    }

    /// Wrap a raw value received from a caller.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw integer value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Device-type tag byte.
    #[inline]
    pub const fn tag(self) -> u8 {
        (self.0 >> TAG_SHIFT) as u8
    }

    /// Bus index byte, without validation.
    #[inline]
    pub const fn bus(self) -> u8 {
        (self.0 >> BUS_SHIFT) as u8
    }

    /// Slot index byte, without validation.
    #[inline]
    pub const fn slot(self) -> u8 {
        (self.0 >> SLOT_SHIFT) as u8
    }

    /// Generation byte, without validation.
    #[inline]
    pub const fn generation(self) -> u8 {
        (self.0 >> GENERATION_SHIFT) as u8
    }

    /// Validate and unpack the handle.
    ///
    /// Returns `None` when the type tag is not the SPI tag, the bus index is
    /// not below `bus_count` (the number of buses the driver reports), or the
    /// slot index is not below [`MAX_DEVICES_PER_BUS`].
    pub fn decode(self, bus_count: usize) -> Option<HandleParts> {
        if self.tag() != DEVICE_TYPE_SPI {
            return None;
        }
        let bus = self.bus();
        let slot = self.slot();
        if usize::from(bus) >= bus_count || usize::from(slot) >= MAX_DEVICES_PER_BUS {
            return None;
        }
        Some(HandleParts {
            bus,
            slot,
            generation: self.generation(),
        })
    }
}

impl From<DeviceHandle> for u32 {
    fn from(handle: DeviceHandle) -> Self {
        handle.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
