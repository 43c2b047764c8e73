//! Error types for SPI core operations.
//!
//! Every failure returned by the core carries enough context to log, and maps
//! onto one of four caller-facing kinds through [`SpiError::kind`].

use crate::spi::driver::DriverError;
use crate::spi::handle::DeviceHandle;
use crate::spi::types::GpioPin;
use thiserror::Error;

/// Caller-facing error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpiErrorKind {
    /// Malformed or stale handle, unavailable bus, pin conflict.
    InvalidParameter,
    /// No free device slot.
    ResourceExhausted,
    /// Chip-select already used by another device on the bus.
    NotSupported,
    /// Driver rejected a committed operation.
    Failure,
}

/// Errors returned by the SPI core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpiError {
    /// Handle does not decode or does not refer to an open device
    #[error("Invalid device handle {0}")]
    InvalidHandle(DeviceHandle),

    /// Bus index not present in the driver's port map
    #[error("SPI bus {bus} is not available")]
    BusUnavailable {
        /// Requested bus
        bus: u8,
    },

    /// Driver refused to bring the bus up
    #[error("Failed to initialize SPI bus {bus}: {source}")]
    BusInitFailed {
        /// Bus index
        bus: u8,
        /// Driver error
        source: DriverError,
    },

    /// A bus pin is already held by another consumer
    #[error("{pin} is already in use")]
    PinBusy {
        /// Busy pin
        pin: GpioPin,
    },

    /// Driver refused to change the reservation of a pin
    #[error("Failed to {} {pin}", reservation_verb(.reserve))]
    PinReservationFailed {
        /// Pin
        pin: GpioPin,
        /// Requested state
        reserve: bool,
    },

    /// All device slots on the bus are taken
    #[error("No free device slot on SPI bus {bus}")]
    NoFreeSlot {
        /// Bus index
        bus: u8,
    },

    /// Chip-select already used by an open device on the bus
    #[error("Chip select {pin:?} already in use on SPI bus {bus}")]
    ChipSelectInUse {
        /// Bus index
        bus: u8,
        /// Conflicting chip-select
        pin: Option<GpioPin>,
    },

    /// Driver could not add the device
    #[error("Failed to add device on SPI bus {bus}: {source}")]
    DeviceAddFailed {
        /// Bus index
        bus: u8,
        /// Driver error
        source: DriverError,
    },

    /// Chip-select pin could not be reserved after the device was added
    #[error("Failed to reserve chip select {pin} on SPI bus {bus}")]
    ChipSelectReservationFailed {
        /// Bus index
        bus: u8,
        /// Chip-select pin
        pin: GpioPin,
    },

    /// Driver reported a transfer failure
    #[error("Transfer failed: {0}")]
    Transfer(#[from] DriverError),
}

fn reservation_verb(reserve: &bool) -> &'static str {
    if *reserve { "reserve" } else { "release" }
}

impl SpiError {
    /// Caller-facing classification.
    pub fn kind(&self) -> SpiErrorKind {
        match self {
            Self::InvalidHandle(_)
            | Self::BusUnavailable { .. }
            | Self::BusInitFailed { .. }
            | Self::PinBusy { .. }
            | Self::PinReservationFailed { .. } => SpiErrorKind::InvalidParameter,
            Self::NoFreeSlot { .. } => SpiErrorKind::ResourceExhausted,
            Self::ChipSelectInUse { .. } => SpiErrorKind::NotSupported,
            Self::DeviceAddFailed { .. }
            | Self::ChipSelectReservationFailed { .. }
            | Self::Transfer(_) => SpiErrorKind::Failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            SpiError::InvalidHandle(DeviceHandle::from_raw(0)).kind(),
            SpiErrorKind::InvalidParameter
        );
        assert_eq!(
            SpiError::PinBusy { pin: GpioPin(3) }.kind(),
            SpiErrorKind::InvalidParameter
        );
        assert_eq!(
            SpiError::NoFreeSlot { bus: 0 }.kind(),
            SpiErrorKind::ResourceExhausted
        );
        assert_eq!(
            SpiError::ChipSelectInUse {
                bus: 0,
                pin: Some(GpioPin(10))
            }
            .kind(),
            SpiErrorKind::NotSupported
        );
        assert_eq!(
            SpiError::ChipSelectReservationFailed {
                bus: 0,
                pin: GpioPin(10)
            }
            .kind(),
            SpiErrorKind::Failure
        );
    }

    #[test]
    fn display_carries_context() {
        let err = SpiError::PinReservationFailed {
            pin: GpioPin(14),
            reserve: false,
        };
        assert_eq!(err.to_string(), "Failed to release GPIO14");

        let err = SpiError::BusInitFailed {
            bus: 1,
            source: DriverError::Hardware("pins not configured".to_string()),
        };
        assert!(err.to_string().contains("bus 1"));
        assert!(err.to_string().contains("pins not configured"));
    }

    #[test]
    fn driver_error_converts_to_transfer() {
        let err: SpiError = DriverError::OutOfMemory.into();
        assert!(matches!(err, SpiError::Transfer(DriverError::OutOfMemory)));
        assert_eq!(err.kind(), SpiErrorKind::Failure);
    }
}
