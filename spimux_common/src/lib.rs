//! spimux Common Library
//!
//! This crate provides the shared vocabulary of the SPI multiplexer: the
//! handle codec, device and transfer types, error taxonomy, the driver
//! capability trait and configuration loading.
//!
//! # Module Structure
//!
//! - [`spi`] - SPI constants, handle codec, types, errors and driver trait
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use spimux_common::prelude::*;
//!
//! let handle = DeviceHandle::encode(0, 1, 0);
//! let parts = handle.decode(2).expect("valid handle");
//! assert_eq!((parts.bus, parts.slot), (0, 1));
//! ```

pub mod config;
pub mod prelude;
pub mod spi;
