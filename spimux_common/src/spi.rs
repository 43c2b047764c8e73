//! SPI multiplexer types, constants and driver interface.
//!
//! This module contains everything shared between the SPI core and the
//! drivers that plug into it.

pub mod config;
pub mod consts;
pub mod driver;
pub mod error;
pub mod handle;
pub mod types;
