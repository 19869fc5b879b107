//! # LinkDB Core
//!
//! Record model and record store for a device-resident link database.
//!
//! This crate provides:
//! - `DeviceAddress` for peer device addresses
//! - `ControlFlags` and `LinkRecord` for individual database records
//! - `RecordStore`, the address-indexed table with its completion predicate
//!
//! ## Key Invariants
//!
//! - Records are keyed by memory address; a later arrival for the same address
//!   replaces the earlier one, nothing is ever removed
//! - The table grows downward from the head address in steps of `RECORD_STRIDE`
//! - A store is loaded only when an unbroken chain reaches a high-water mark
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod address;
mod error;
mod record;
mod store;

pub use address::DeviceAddress;
pub use error::{CoreError, CoreResult};
pub use record::{ControlFlags, LinkRecord, LEGACY_HEAD_ADDR, RECORD_SIZE, RECORD_STRIDE};
pub use store::{ChainEnd, LoadStatus, RecordStore, Upsert};
