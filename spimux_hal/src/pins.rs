//! Pin reservation coordinator.
//!
//! Bus pins (clock, MISO, MOSI) are reserved as a set when a bus is brought
//! up and released as a set when it goes down. Chip-select pins are reserved
//! per device.

use spimux_common::spi::driver::SpiDriver;
use spimux_common::spi::error::SpiError;
use spimux_common::spi::types::GpioPin;
use tracing::{debug, warn};

/// Reserve (`reserve == true`) or release the routed pins of `bus`.
///
/// Reserving is all-or-nothing: every routed pin is checked for busyness
/// before anything is claimed, and pins claimed before a driver refusal are
/// released again. Releasing visits every pin and reports the first refusal.
pub(crate) fn reserve_bus_pins(
    driver: &mut dyn SpiDriver,
    bus: u8,
    reserve: bool,
) -> Result<(), SpiError> {
    let pins = driver.bus_pins(bus).routed();

    if !reserve {
        return release_all(driver, bus, &pins);
    }

    if let Some(&pin) = pins.iter().find(|pin| driver.pin_is_busy(**pin)) {
        debug!("SPI bus {}: {} busy, not reserving", bus, pin);
        return Err(SpiError::PinBusy { pin });
    }

    for (idx, &pin) in pins.iter().enumerate() {
        if let Err(e) = driver.reserve_pin(pin, true) {
            warn!("SPI bus {}: failed to reserve {}: {}", bus, pin, e);
            for &claimed in pins[..idx].iter().rev() {
                if let Err(e) = driver.reserve_pin(claimed, false) {
                    warn!("SPI bus {}: rollback of {} failed: {}", bus, claimed, e);
                }
            }
            return Err(SpiError::PinReservationFailed { pin, reserve: true });
        }
    }

    debug!("SPI bus {}: reserved {:?}", bus, pins.as_slice());
    Ok(())
}

fn release_all(driver: &mut dyn SpiDriver, bus: u8, pins: &[GpioPin]) -> Result<(), SpiError> {
    let mut first_failure = None;
    for &pin in pins {
        if let Err(e) = driver.reserve_pin(pin, false) {
            warn!("SPI bus {}: failed to release {}: {}", bus, pin, e);
            first_failure.get_or_insert(SpiError::PinReservationFailed {
                pin,
                reserve: false,
            });
        }
    }
    match first_failure {
        Some(err) => Err(err),
        None => {
            debug!("SPI bus {}: released {:?}", bus, pins);
            Ok(())
        }
    }
}

/// Reserve a device chip-select. `None` needs no reservation.
pub(crate) fn reserve_chip_select(
    driver: &mut dyn SpiDriver,
    bus: u8,
    chip_select: Option<GpioPin>,
) -> Result<(), SpiError> {
    let Some(pin) = chip_select else {
        return Ok(());
    };
    driver.reserve_pin(pin, true).map_err(|e| {
        warn!("SPI bus {}: chip select {} reservation failed: {}", bus, pin, e);
        SpiError::ChipSelectReservationFailed { bus, pin }
    })
}

/// Release a device chip-select. Failures are logged only.
pub(crate) fn release_chip_select(driver: &mut dyn SpiDriver, bus: u8, chip_select: Option<GpioPin>) {
    let Some(pin) = chip_select else {
        return;
    };
    if let Err(e) = driver.reserve_pin(pin, false) {
        warn!("SPI bus {}: failed to release chip select {}: {}", bus, pin, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spimux_common::spi::driver::DriverError;
    use spimux_common::spi::types::{BusPins, DeviceConfig, DriverHandle, OpStatus, PortMap, WriteReadSettings};
    use std::collections::HashSet;

    #[derive(Default)]
    struct PinDriver {
        pins: BusPins,
        busy: HashSet<u16>,
        refuse: HashSet<u16>,
        reserved: Vec<u16>,
        calls: Vec<(u16, bool)>,
    }

    impl SpiDriver for PinDriver {
        fn name(&self) -> &'static str {
            "pins"
        }

        fn version(&self) -> &'static str {
            "0.1.0"
        }

        fn ports_map(&self) -> PortMap {
            PortMap::BUS0
        }

        fn write_read(
            &mut self,
            _handle: DriverHandle,
            _config: &DeviceConfig,
            _settings: &WriteReadSettings,
            _write: &[u8],
            _read: &mut [u8],
        ) -> Result<OpStatus, DriverError> {
            Ok(OpStatus::Complete)
        }

        fn bus_pins(&self, _bus: u8) -> BusPins {
            self.pins
        }

        fn pin_is_busy(&self, pin: GpioPin) -> bool {
            self.busy.contains(&pin.0)
        }

        fn reserve_pin(&mut self, pin: GpioPin, reserve: bool) -> Result<(), DriverError> {
            self.calls.push((pin.0, reserve));
            if self.refuse.contains(&pin.0) {
                return Err(DriverError::Hardware(format!("{pin} locked")));
            }
            if reserve {
                self.reserved.push(pin.0);
            } else {
                self.reserved.retain(|p| *p != pin.0);
            }
            Ok(())
        }
    }

    fn driver() -> PinDriver {
        PinDriver {
            pins: BusPins::new(14, 12, 13),
            ..PinDriver::default()
        }
    }

    #[test]
    fn reserves_every_routed_pin() {
        let mut drv = driver();
        reserve_bus_pins(&mut drv, 0, true).unwrap();
        assert_eq!(drv.reserved, vec![14, 12, 13]);
    }

    #[test]
    fn unrouted_pins_are_skipped() {
        let mut drv = PinDriver {
            pins: BusPins {
                miso: None,
                ..BusPins::new(14, 12, 13)
            },
            ..PinDriver::default()
        };
        reserve_bus_pins(&mut drv, 0, true).unwrap();
        assert_eq!(drv.reserved, vec![14, 13]);
    }

    #[test]
    fn busy_pin_aborts_before_any_reservation() {
        let mut drv = driver();
        drv.busy.insert(13);
        let err = reserve_bus_pins(&mut drv, 0, true).unwrap_err();
        assert_eq!(err, SpiError::PinBusy { pin: GpioPin(13) });
        assert!(drv.calls.is_empty());
    }

    #[test]
    fn refusal_rolls_back_claimed_pins() {
        let mut drv = driver();
        drv.refuse.insert(13);
        let err = reserve_bus_pins(&mut drv, 0, true).unwrap_err();
        assert_eq!(
            err,
            SpiError::PinReservationFailed {
                pin: GpioPin(13),
                reserve: true
            }
        );
        assert!(drv.reserved.is_empty());
        assert_eq!(
            drv.calls,
            vec![(14, true), (12, true), (13, true), (12, false), (14, false)]
        );
    }

    #[test]
    fn release_visits_every_pin() {
        let mut drv = driver();
        reserve_bus_pins(&mut drv, 0, true).unwrap();
        drv.refuse.insert(14);
        let err = reserve_bus_pins(&mut drv, 0, false).unwrap_err();
        assert_eq!(
            err,
            SpiError::PinReservationFailed {
                pin: GpioPin(14),
                reserve: false
            }
        );
        assert_eq!(drv.reserved, vec![14]);
    }

    #[test]
    fn chip_select_none_is_not_reserved() {
        let mut drv = driver();
        reserve_chip_select(&mut drv, 0, None).unwrap();
        release_chip_select(&mut drv, 0, None);
        assert!(drv.calls.is_empty());
    }

    #[test]
    fn chip_select_refusal_maps_to_failure() {
        let mut drv = driver();
        drv.refuse.insert(5);
        let err = reserve_chip_select(&mut drv, 0, Some(GpioPin(5))).unwrap_err();
        assert_eq!(
            err,
            SpiError::ChipSelectReservationFailed {
                bus: 0,
                pin: GpioPin(5)
            }
        );
    }
}
