//! SPI device, pin and transfer types.
//!
//! This module defines the data passed between callers, the core and drivers:
//! - `DeviceConfig` - Per-device configuration, opaque to the core except for
//!   bus, chip-select and clock rate
//! - `GpioPin` / `BusPins` - Pin identifiers
//! - `PortMap` - Bitmap of available buses
//! - `DriverHandle` - Driver-assigned device identity
//! - `WriteReadSettings` / `OpStatus` - Transfer parameters and status
//! - `BusInfo` - Per-bus capability summary

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// A GPIO pin number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GpioPin(pub u16);

impl fmt::Display for GpioPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

/// Clock, MISO and MOSI pins of a bus. `None` means the pin is not routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BusPins {
    /// Clock pin
    #[serde(default)]
    pub clock: Option<GpioPin>,
    /// Master-in / slave-out pin
    #[serde(default)]
    pub miso: Option<GpioPin>,
    /// Master-out / slave-in pin
    #[serde(default)]
    pub mosi: Option<GpioPin>,
}

impl BusPins {
    /// No pins routed.
    pub const NONE: Self = Self {
        clock: None,
        miso: None,
        mosi: None,
    };

    /// Create a fully routed pin set.
    pub const fn new(clock: u16, miso: u16, mosi: u16) -> Self {
        Self {
            clock: Some(GpioPin(clock)),
            miso: Some(GpioPin(miso)),
            mosi: Some(GpioPin(mosi)),
        }
    }

    /// Routed pins in clock, MISO, MOSI order.
    pub fn routed(&self) -> heapless::Vec<GpioPin, 3> {
        [self.clock, self.miso, self.mosi].into_iter().flatten().collect()
    }

    /// True when all three pins are routed.
    pub fn is_complete(&self) -> bool {
        self.clock.is_some() && self.miso.is_some() && self.mosi.is_some()
    }
}

bitflags! {
    /// Bitmap of SPI buses present on the target. Bit `n` set means bus `n`
    /// exists.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PortMap: u32 {
        /// Bus 0
        const BUS0 = 1 << 0;
        /// Bus 1
        const BUS1 = 1 << 1;
        /// Bus 2
        const BUS2 = 1 << 2;
        /// Bus 3
        const BUS3 = 1 << 3;

        const _ = !0;
    }
}

impl PortMap {
    /// Map with only `bus` set. Indices of 32 and above produce an empty map.
    pub const fn bus(bus: u8) -> Self {
        match 1u32.checked_shl(bus as u32) {
            Some(bit) => Self::from_bits_retain(bit),
            None => Self::empty(),
        }
    }

    /// Build a map from a list of bus indices.
    pub fn from_buses<I: IntoIterator<Item = u8>>(buses: I) -> Self {
        buses
            .into_iter()
            .fold(Self::empty(), |map, bus| map | Self::bus(bus))
    }

    /// True if `bus` is present.
    #[inline]
    pub fn has_bus(&self, bus: u8) -> bool {
        let bit = Self::bus(bus);
        !bit.is_empty() && self.contains(bit)
    }

    /// Number of buses present.
    #[inline]
    pub fn count(&self) -> usize {
        self.bits().count_ones() as usize
    }

    /// Indices of present buses, ascending.
    pub fn buses(&self) -> impl Iterator<Item = u8> + '_ {
        (0..32u8).filter(move |bus| self.has_bus(*bus))
    }
}

impl Default for PortMap {
    fn default() -> Self {
        Self::empty()
    }
}

/// SPI mode (clock polarity and phase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpiMode {
    /// CPOL=0, CPHA=0
    #[default]
    Mode0,
    /// CPOL=0, CPHA=1
    Mode1,
    /// CPOL=1, CPHA=0
    Mode2,
    /// CPOL=1, CPHA=1
    Mode3,
}

impl SpiMode {
    /// Clock idles high (CPOL=1).
    pub const fn idle_high(self) -> bool {
        matches!(self, Self::Mode2 | Self::Mode3)
    }

    /// Data captured on the second clock edge (CPHA=1).
    pub const fn second_edge(self) -> bool {
        matches!(self, Self::Mode1 | Self::Mode3)
    }
}

/// Bit order on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BitOrder {
    /// Most significant bit first
    #[default]
    Msb,
    /// Least significant bit first
    Lsb,
}

/// Data line configuration of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BusConfiguration {
    /// Separate MISO and MOSI lines
    #[default]
    FullDuplex,
    /// Shared data line, write then read
    HalfDuplex,
    /// Write only
    Simplex,
}

/// Device configuration supplied at open time.
///
/// The core only interprets `bus`, `chip_select` and `clock_rate_hz`;
/// everything else is handed to the driver unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Bus index (0-based)
    pub bus: u8,
    /// Chip-select pin. `None` for a device with its select line tied active.
    #[serde(default)]
    pub chip_select: Option<GpioPin>,
    /// Chip-select is active high
    #[serde(default)]
    pub chip_select_active_high: bool,
    /// Clock polarity/phase
    #[serde(default)]
    pub mode: SpiMode,
    /// Bit order
    #[serde(default)]
    pub bit_order: BitOrder,
    /// Clock rate in Hz. 0 selects the bus maximum.
    pub clock_rate_hz: u32,
    /// Data line configuration
    #[serde(default)]
    pub bus_configuration: BusConfiguration,
}

impl DeviceConfig {
    /// Mode 0, MSB first, active-low chip-select.
    pub fn new(bus: u8, chip_select: u16, clock_rate_hz: u32) -> Self {
        Self {
            bus,
            chip_select: Some(GpioPin(chip_select)),
            clock_rate_hz,
            ..Self::default()
        }
    }

    /// Replace the SPI mode.
    pub fn with_mode(mut self, mode: SpiMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the bit order.
    pub fn with_bit_order(mut self, bit_order: BitOrder) -> Self {
        self.bit_order = bit_order;
        self
    }
}

/// Identity a driver assigns to an added device. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverHandle(NonZeroU32);

impl DriverHandle {
    /// Smallest valid handle.
    pub const FIRST: Self = Self(NonZeroU32::MIN);

    /// Returns `None` for 0, which drivers must never hand out.
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Raw value.
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for DriverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "drv#{}", self.0)
    }
}

/// Per-transfer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WriteReadSettings {
    /// Write and read clocked simultaneously. When false, the write phase is
    /// clocked first and the read phase follows.
    #[serde(default)]
    pub full_duplex: bool,
    /// Elements of the read phase to discard before filling the read buffer
    /// (half duplex only).
    #[serde(default)]
    pub read_offset: usize,
    /// 16-bit elements instead of bytes.
    #[serde(default)]
    pub data16: bool,
}

impl WriteReadSettings {
    /// Full-duplex, 8-bit, no offset.
    pub const FULL_DUPLEX: Self = Self {
        full_duplex: true,
        read_offset: 0,
        data16: false,
    };

    /// Half-duplex, 8-bit, no offset.
    pub const HALF_DUPLEX: Self = Self {
        full_duplex: false,
        read_offset: 0,
        data16: false,
    };
}

/// Status of the last operation on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    /// Operation finished
    #[default]
    Complete,
    /// Operation still running (asynchronous transfer started)
    Busy,
    /// Operation failed
    Error,
}

/// Capabilities of one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusInfo {
    /// Bus index
    pub bus: u8,
    /// Lowest configurable clock in Hz
    pub min_clock_hz: u32,
    /// Highest configurable clock in Hz
    pub max_clock_hz: u32,
    /// Number of hardware chip-select lines
    pub chip_select_lines: u32,
    /// Routed bus pins
    pub pins: BusPins,
}
