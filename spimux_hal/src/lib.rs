//! # spimux HAL Library
//!
//! Logical SPI device multiplexer with pluggable driver architecture.
//!
//! Callers open devices on shared physical buses and receive opaque
//! [`DeviceHandle`](spimux_common::spi::handle::DeviceHandle)s. The core keeps
//! a fixed slot table per bus, brings buses up on first use and down after the
//! last close, and coordinates pin reservations so no two consumers share a
//! clock, data or chip-select pin. Byte transfer is delegated to a driver
//! implementing `SpiDriver` from `spimux_common::spi::driver`.
//!
//! # Module Structure
//!
//! - [`core`] - SpiCore struct, device lifecycle and transfer delegation
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - SPI driver implementations
//! - [`report`] - Serializable state snapshot
//! - [`service`] - Configuration-driven startup
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    spimux_hal (single crate)                     │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │  SpiService │───►│   SpiCore    │    │  Driver Registry    │  │
//! │  │  (config)   │    │ (slot table) │    │                     │  │
//! │  └──────┬──────┘    └──────┬───────┘    └──────────┬──────────┘  │
//! │         │                  │                       │             │
//! │         │                  ▼                       │             │
//! │         │          ┌────────────────┐              │             │
//! │         └─────────►│   SpiDriver    │◄─────────────┘             │
//! │                    │   (trait obj)  │                            │
//! │                    └────────────────┘                            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod core;
pub mod driver_registry;
pub mod drivers;
pub mod report;
pub mod service;

mod pins;
mod slot_table;

// Re-export key types for convenience
pub use crate::core::SpiCore;
pub use crate::driver_registry::DriverRegistry;
pub use crate::report::{BusReport, CoreReport, DeviceReport};
pub use crate::service::{ServiceError, SpiService};
