//! Per-bus device slot table.
//!
//! One [`BusSlots`] record per physical bus, each with a fixed array of
//! device slots. The table is owned by [`SpiCore`](crate::core::SpiCore) and
//! only mutated through its open/close paths.

use spimux_common::spi::consts::{MAX_DEVICES_PER_BUS, MAX_SPI_BUSES};
use spimux_common::spi::handle::{DeviceHandle, HandleParts};
use spimux_common::spi::types::{DeviceConfig, DriverHandle, GpioPin};

/// One device slot.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Slot {
    /// Configuration supplied at open time. Meaningful only when occupied.
    pub config: DeviceConfig,
    /// Driver identity; `None` when the slot is free.
    pub driver_handle: Option<DriverHandle>,
    /// Bumped on every open so handles minted for a previous occupant no
    /// longer match.
    pub generation: u8,
}

impl Slot {
    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.driver_handle.is_some()
    }
}

/// Outcome of the free-slot / chip-select scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotSearch {
    /// Lowest free slot index; no occupied slot uses the chip-select.
    Free(u8),
    /// An occupied slot already uses the chip-select.
    Collision(u8),
    /// Every slot is occupied.
    Full,
}

/// Slot record of one bus.
#[derive(Debug, Clone)]
pub(crate) struct BusSlots {
    /// Bus brought up by the driver and its pins reserved
    pub initialized: bool,
    /// Number of occupied slots
    pub devices_in_use: usize,
    /// Device slots
    pub slots: [Slot; MAX_DEVICES_PER_BUS],
    /// Milliseconds per byte for the most recently opened device
    pub byte_time_ms: f64,
}

impl Default for BusSlots {
    fn default() -> Self {
        Self {
            initialized: false,
            devices_in_use: 0,
            slots: [Slot::default(); MAX_DEVICES_PER_BUS],
            byte_time_ms: 0.0,
        }
    }
}

impl BusSlots {
    /// Clear every slot. Generations survive so handles from before the
    /// reset stay stale.
    pub fn reset(&mut self) {
        self.initialized = false;
        self.devices_in_use = 0;
        self.byte_time_ms = 0.0;
        for slot in &mut self.slots {
            slot.driver_handle = None;
        }
    }

    /// Single ascending pass over the slots.
    ///
    /// Remembers the first free slot but keeps checking the occupied ones, so
    /// a chip-select collision anywhere on the bus wins over a free slot.
    pub fn find_free_slot(&self, chip_select: Option<GpioPin>) -> SlotSearch {
        let mut free = None;
        for (idx, slot) in self.slots.iter().enumerate() {
            if !slot.is_occupied() {
                free.get_or_insert(idx as u8);
            } else if slot.config.chip_select == chip_select {
                return SlotSearch::Collision(idx as u8);
            }
        }
        free.map_or(SlotSearch::Full, SlotSearch::Free)
    }

    /// Record a newly opened device and return its generation.
    ///
    /// The generation wraps modulo 256.
    pub fn occupy(
        &mut self,
        slot: u8,
        config: DeviceConfig,
        driver_handle: DriverHandle,
        byte_time_ms: f64,
    ) -> u8 {
        let entry = &mut self.slots[usize::from(slot)];
        entry.config = config;
        entry.driver_handle = Some(driver_handle);
        entry.generation = entry.generation.wrapping_add(1);
        self.devices_in_use += 1;
        self.byte_time_ms = byte_time_ms;
        entry.generation
    }

    /// Free an occupied slot, returning what it held.
    pub fn release(&mut self, slot: u8) -> Option<(DeviceConfig, DriverHandle)> {
        let entry = &mut self.slots[usize::from(slot)];
        let driver_handle = entry.driver_handle.take()?;
        self.devices_in_use = self.devices_in_use.saturating_sub(1);
        Some((entry.config, driver_handle))
    }

    /// Occupied slot matching the handle's generation.
    pub fn lookup(&self, slot: u8, generation: u8) -> Option<&Slot> {
        self.slots
            .get(usize::from(slot))
            .filter(|s| s.is_occupied() && s.generation == generation)
    }

    /// Occupied slots with their indices.
    pub fn occupied(&self) -> impl Iterator<Item = (u8, &Slot)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_occupied())
            .map(|(idx, s)| (idx as u8, s))
    }
}

/// Fixed-size table of all buses.
#[derive(Debug, Clone)]
pub(crate) struct SlotTable {
    buses: [BusSlots; MAX_SPI_BUSES],
}

impl SlotTable {
    pub fn new() -> Self {
        Self {
            buses: std::array::from_fn(|_| BusSlots::default()),
        }
    }

    pub fn reset(&mut self) {
        for bus in &mut self.buses {
            bus.reset();
        }
    }

    pub fn bus(&self, bus: u8) -> Option<&BusSlots> {
        self.buses.get(usize::from(bus))
    }

    pub fn bus_mut(&mut self, bus: u8) -> Option<&mut BusSlots> {
        self.buses.get_mut(usize::from(bus))
    }

    /// Slot a decoded handle refers to, if still open.
    pub fn resolve(&self, parts: HandleParts) -> Option<&Slot> {
        self.bus(parts.bus)?.lookup(parts.slot, parts.generation)
    }

    /// Handles of every open device on `bus`, ascending slot order.
    pub fn open_handles(&self, bus: u8) -> Vec<DeviceHandle> {
        self.bus(bus)
            .map(|b| {
                b.occupied()
                    .map(|(idx, slot)| DeviceHandle::encode(bus, idx, slot.generation))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &BusSlots)> {
        self.buses.iter().enumerate().map(|(idx, b)| (idx as u8, b))
    }
}
