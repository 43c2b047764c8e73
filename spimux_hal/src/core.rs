//! SPI core: device lifecycle over a pluggable driver.
//!
//! The `SpiCore` struct owns the driver and the slot table. Every caller
//! operation goes through it:
//!
//! - Open assigns a slot on the device's bus, bringing the bus up on first use
//! - Close frees the slot, bringing the bus down after the last device
//! - Transfers and status queries validate the handle, then delegate
//!
//! All mutating operations take `&mut self`; callers serialize access.

use spimux_common::spi::consts::{MAX_DEVICES_PER_BUS, MAX_SPI_BUSES};
use spimux_common::spi::driver::{DriverError, SpiDriver};
use spimux_common::spi::error::SpiError;
use spimux_common::spi::handle::{DeviceHandle, HandleParts};
use spimux_common::spi::types::{
    BusInfo, BusPins, DeviceConfig, DriverHandle, OpStatus, WriteReadSettings,
};
use tracing::{debug, info, trace, warn};

use crate::pins;
use crate::report::{BusReport, CoreReport, DeviceReport};
use crate::slot_table::{BusSlots, SlotSearch, SlotTable};

/// An open device resolved from a handle.
#[derive(Debug, Clone, Copy)]
struct OpenDevice {
    parts: HandleParts,
    config: DeviceConfig,
    driver_handle: DriverHandle,
}

/// SPI core managing devices across all buses of one driver.
pub struct SpiCore {
    /// Active driver instance
    driver: Box<dyn SpiDriver>,
    /// Per-bus slot records
    table: SlotTable,
}

impl SpiCore {
    /// Create a core over an initialized driver. The slot table starts reset.
    pub fn new(driver: Box<dyn SpiDriver>) -> Self {
        let mut core = Self {
            driver,
            table: SlotTable::new(),
        };
        core.initialize_all();
        core
    }

    /// Reset every bus record: not initialized, no devices.
    ///
    /// Does not talk to the driver. Safe to call repeatedly.
    pub fn initialize_all(&mut self) {
        self.table.reset();
        info!(
            "SPI core reset: driver '{}' v{}, ports {:?}",
            self.driver.name(),
            self.driver.version(),
            self.driver.ports_map().buses().collect::<Vec<_>>()
        );
    }

    /// Close every open device on every initialized bus.
    pub fn teardown_all(&mut self) {
        let mut closed = 0usize;
        for bus in 0..MAX_SPI_BUSES as u8 {
            let Some(slots) = self.table.bus(bus) else {
                continue;
            };
            if !slots.initialized {
                continue;
            }
            let occupied: Vec<u8> = slots.occupied().map(|(slot, _)| slot).collect();
            for slot in occupied {
                self.close_slot(bus, slot);
                closed += 1;
            }
            if self.is_bus_initialized(bus) {
                self.release_bus(bus);
            }
        }
        info!("SPI core teardown complete ({} device(s) closed)", closed);
    }

    /// Open a device and return its handle.
    ///
    /// # Errors
    /// - `BusUnavailable` - bus not in the driver's port map
    /// - `NoFreeSlot` - `MAX_DEVICES_PER_BUS` devices already open on the bus
    /// - `BusInitFailed` / `PinBusy` / `PinReservationFailed` - the bus could
    ///   not be brought up
    /// - `ChipSelectInUse` - another open device uses the same chip-select
    /// - `DeviceAddFailed` / `ChipSelectReservationFailed` - the driver
    ///   refused the device
    ///
    /// A bus brought up by this call is brought down again when the open
    /// fails afterwards.
    pub fn open_device(&mut self, config: &DeviceConfig) -> Result<DeviceHandle, SpiError> {
        let bus = config.bus;
        let slots = self.available_bus(bus)?;

        if slots.devices_in_use >= MAX_DEVICES_PER_BUS {
            debug!("SPI bus {}: all {} slots in use", bus, MAX_DEVICES_PER_BUS);
            return Err(SpiError::NoFreeSlot { bus });
        }

        let fresh = !slots.initialized;
        if fresh {
            self.bring_up_bus(bus)?;
        }

        self.attach_device(config).inspect_err(|_| {
            if fresh {
                self.release_bus(bus);
            }
        })
    }

    /// Open a device with alternate clock/MISO/MOSI pins.
    ///
    /// Alternate routing is not applied; the device is opened on the bus's
    /// own pins exactly as [`open_device`](Self::open_device) would.
    pub fn open_device_with_alt_pins(
        &mut self,
        config: &DeviceConfig,
        alt_pins: BusPins,
    ) -> Result<DeviceHandle, SpiError> {
        if alt_pins != BusPins::NONE {
            debug!(
                "SPI bus {}: ignoring alternate pins {:?}",
                config.bus, alt_pins
            );
        }
        self.open_device(config)
    }

    /// Close a device.
    ///
    /// Driver errors while removing the device or releasing pins are logged
    /// and not returned.
    ///
    /// # Errors
    /// `InvalidHandle` if the handle does not refer to an open device.
    pub fn close_device(&mut self, handle: DeviceHandle) -> Result<(), SpiError> {
        let device = self.resolve(handle)?;
        self.close_slot(device.parts.bus, device.parts.slot);
        Ok(())
    }

    /// Write and read on a device.
    ///
    /// # Errors
    /// `InvalidHandle` for a stale or malformed handle, `Transfer` when the
    /// driver fails.
    pub fn write_read(
        &mut self,
        handle: DeviceHandle,
        settings: &WriteReadSettings,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<OpStatus, SpiError> {
        let device = self.resolve(handle)?;
        trace!(
            "SPI {}: write {} byte(s), read {} byte(s), {:?}",
            handle,
            write.len(),
            read.len(),
            settings
        );
        self.driver
            .write_read(device.driver_handle, &device.config, settings, write, read)
            .map_err(|e| transfer_failed(handle, e))
    }

    /// 16-bit variant of [`write_read`](Self::write_read).
    pub fn write16_read16(
        &mut self,
        handle: DeviceHandle,
        settings: &WriteReadSettings,
        write: &[u16],
        read: &mut [u16],
    ) -> Result<OpStatus, SpiError> {
        let device = self.resolve(handle)?;
        trace!(
            "SPI {}: write {} word(s), read {} word(s), {:?}",
            handle,
            write.len(),
            read.len(),
            settings
        );
        self.driver
            .write16_read16(device.driver_handle, &device.config, settings, write, read)
            .map_err(|e| transfer_failed(handle, e))
    }

    /// Milliseconds per byte on the handle's bus.
    ///
    /// The estimate belongs to the bus and reflects the most recently opened
    /// device on it.
    pub fn byte_time_estimate(&self, handle: DeviceHandle) -> Result<f64, SpiError> {
        let device = self.resolve(handle)?;
        self.table
            .bus(device.parts.bus)
            .map(|slots| slots.byte_time_ms)
            .ok_or(SpiError::InvalidHandle(handle))
    }

    /// Status of the last operation on the device.
    pub fn operation_status(&self, handle: DeviceHandle) -> Result<OpStatus, SpiError> {
        let device = self.resolve(handle)?;
        Ok(self.driver.operation_status(device.driver_handle))
    }

    /// Clock limits, chip-select lines and pins of a bus.
    pub fn bus_info(&self, bus: u8) -> Result<BusInfo, SpiError> {
        self.available_bus(bus)?;
        Ok(self.describe_bus(bus))
    }

    /// Number of open devices on `bus` (0 for unknown buses).
    pub fn devices_in_use(&self, bus: u8) -> usize {
        self.table.bus(bus).map_or(0, |slots| slots.devices_in_use)
    }

    /// True while at least one device is open on `bus`.
    pub fn is_bus_initialized(&self, bus: u8) -> bool {
        self.table.bus(bus).is_some_and(|slots| slots.initialized)
    }

    /// Configuration the device was opened with.
    pub fn device_config(&self, handle: DeviceHandle) -> Result<DeviceConfig, SpiError> {
        self.resolve(handle).map(|device| device.config)
    }

    /// Handles of all open devices, by bus then slot.
    pub fn open_handles(&self) -> Vec<DeviceHandle> {
        (0..MAX_SPI_BUSES as u8)
            .flat_map(|bus| self.table.open_handles(bus))
            .collect()
    }

    /// Snapshot of every available bus and its devices.
    pub fn report(&self) -> CoreReport {
        let buses = self
            .table
            .iter()
            .filter(|(bus, _)| self.driver.ports_map().has_bus(*bus))
            .map(|(bus, slots)| BusReport {
                info: self.describe_bus(bus),
                initialized: slots.initialized,
                devices_in_use: slots.devices_in_use,
                byte_time_ms: slots.byte_time_ms,
                devices: slots
                    .occupied()
                    .filter_map(|(slot, entry)| {
                        Some(DeviceReport {
                            handle: DeviceHandle::encode(bus, slot, entry.generation),
                            slot,
                            driver_handle: entry.driver_handle?,
                            config: entry.config,
                        })
                    })
                    .collect(),
            })
            .collect();

        CoreReport {
            driver: self.driver.name().to_string(),
            version: self.driver.version().to_string(),
            buses,
            diagnostics: self.driver.diagnostics(),
        }
    }

    /// The driver this core delegates to.
    pub fn driver(&self) -> &dyn SpiDriver {
        self.driver.as_ref()
    }

    /// Close every device, then shut the driver down.
    pub fn shutdown(&mut self) -> Result<(), DriverError> {
        self.teardown_all();
        info!("Shutting down driver '{}'", self.driver.name());
        self.driver.shutdown()
    }

    // ─── Internals ──────────────────────────────────────────────────

    /// Upper bound for handle bus indices: one past the highest bus the
    /// driver reports, capped by the table size.
    fn bus_limit(&self) -> usize {
        self.driver
            .ports_map()
            .buses()
            .last()
            .map_or(0, |bus| usize::from(bus) + 1)
            .min(MAX_SPI_BUSES)
    }

    fn available_bus(&self, bus: u8) -> Result<&BusSlots, SpiError> {
        if !self.driver.ports_map().has_bus(bus) {
            debug!("SPI bus {} not in driver port map", bus);
            return Err(SpiError::BusUnavailable { bus });
        }
        self.table.bus(bus).ok_or(SpiError::BusUnavailable { bus })
    }

    fn resolve(&self, handle: DeviceHandle) -> Result<OpenDevice, SpiError> {
        handle
            .decode(self.bus_limit())
            .and_then(|parts| {
                let slot = self.table.resolve(parts)?;
                Some(OpenDevice {
                    parts,
                    config: slot.config,
                    driver_handle: slot.driver_handle?,
                })
            })
            .ok_or(SpiError::InvalidHandle(handle))
    }

    fn describe_bus(&self, bus: u8) -> BusInfo {
        BusInfo {
            bus,
            min_clock_hz: self.driver.min_clock_frequency(bus),
            max_clock_hz: self.driver.max_clock_frequency(bus),
            chip_select_lines: self.driver.chip_select_line_count(bus),
            pins: self.driver.bus_pins(bus),
        }
    }

    /// Driver bus init followed by bus pin reservation.
    fn bring_up_bus(&mut self, bus: u8) -> Result<(), SpiError> {
        self.driver.initialize_bus(bus).map_err(|source| {
            warn!("SPI bus {}: driver initialization failed: {}", bus, source);
            SpiError::BusInitFailed { bus, source }
        })?;

        if let Err(e) = pins::reserve_bus_pins(self.driver.as_mut(), bus, true) {
            self.driver.uninitialize_bus(bus);
            return Err(e);
        }

        if let Some(slots) = self.table.bus_mut(bus) {
            slots.initialized = true;
        }
        info!("SPI bus {} initialized ({:?})", bus, self.driver.bus_pins(bus));
        Ok(())
    }

    /// Driver bus shutdown followed by bus pin release.
    fn release_bus(&mut self, bus: u8) {
        self.driver.uninitialize_bus(bus);
        if let Some(slots) = self.table.bus_mut(bus) {
            slots.initialized = false;
        }
        if let Err(e) = pins::reserve_bus_pins(self.driver.as_mut(), bus, false) {
            warn!("SPI bus {}: pin release incomplete: {}", bus, e);
        }
        info!("SPI bus {} released", bus);
    }

    /// Slot scan, driver add and chip-select reservation on an initialized bus.
    fn attach_device(&mut self, config: &DeviceConfig) -> Result<DeviceHandle, SpiError> {
        let bus = config.bus;
        let search = self.available_bus(bus)?.find_free_slot(config.chip_select);
        let slot = match search {
            SlotSearch::Free(slot) => slot,
            SlotSearch::Collision(slot) => {
                debug!(
                    "SPI bus {}: chip select {:?} held by slot {}",
                    bus, config.chip_select, slot
                );
                return Err(SpiError::ChipSelectInUse {
                    bus,
                    pin: config.chip_select,
                });
            }
            SlotSearch::Full => return Err(SpiError::NoFreeSlot { bus }),
        };

        let driver_handle = self.driver.add_device(config).map_err(|source| {
            warn!("SPI bus {}: driver refused device: {}", bus, source);
            SpiError::DeviceAddFailed { bus, source }
        })?;

        if let Err(e) = pins::reserve_chip_select(self.driver.as_mut(), bus, config.chip_select) {
            if let Err(remove_err) = self.driver.remove_device(driver_handle) {
                warn!(
                    "SPI bus {}: removing {} after failed open: {}",
                    bus, driver_handle, remove_err
                );
            }
            return Err(e);
        }

        let clock_hz = match config.clock_rate_hz {
            0 => self.driver.max_clock_frequency(bus),
            hz => hz,
        };
        let byte_time_ms = 1000.0 / f64::from(clock_hz);

        let slots = self
            .table
            .bus_mut(bus)
            .ok_or(SpiError::BusUnavailable { bus })?;
        let generation = slots.occupy(slot, *config, driver_handle, byte_time_ms);
        let handle = DeviceHandle::encode(bus, slot, generation);

        info!(
            "Opened SPI device {} on bus {} slot {} (cs {:?}, {} Hz, {})",
            handle, bus, slot, config.chip_select, clock_hz, driver_handle
        );
        Ok(handle)
    }

    /// Close path shared by `close_device` and `teardown_all`.
    fn close_slot(&mut self, bus: u8, slot: u8) {
        let Some(slots) = self.table.bus_mut(bus) else {
            return;
        };
        let Some((config, driver_handle)) = slots.release(slot) else {
            return;
        };
        let remaining = slots.devices_in_use;

        if let Err(e) = self.driver.remove_device(driver_handle) {
            warn!("SPI bus {}: removing {} failed: {}", bus, driver_handle, e);
        }
        pins::release_chip_select(self.driver.as_mut(), bus, config.chip_select);
        info!("Closed SPI device on bus {} slot {}", bus, slot);

        if remaining == 0 {
            self.release_bus(bus);
        }
    }
}

fn transfer_failed(handle: DeviceHandle, err: DriverError) -> SpiError {
    warn!("SPI {}: transfer failed: {}", handle, err);
    SpiError::Transfer(err)
}
