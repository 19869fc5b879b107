//! # LinkDB Testkit
//!
//! Test utilities for link database synchronization.
//!
//! This crate provides:
//! - `SimulatedDevice`, a lossy in-process device implementing `CommandChannel`
//! - Fixtures for building device tables
//! - Property-based test generators using proptest
//! - A tracing initializer for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use linkdb_testkit::prelude::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn loads_table() {
//!     let device = SimulatedDevice::new(contiguous_table(0x0fff, 4));
//!     let engine = SyncEngine::new(SyncConfig::default(), device, RecordStore::new(0x0fff))?;
//!     assert!(engine.read_all().await?.outcome.is_complete());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod device;
pub mod fixtures;
pub mod generators;

use tracing_subscriber::EnvFilter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::device::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use linkdb_core::{LinkRecord, RecordStore};
    pub use linkdb_sync_engine::{ReadOutcome, SyncConfig, SyncEngine};
}

pub use device::*;
pub use fixtures::*;
pub use generators::*;

/// Installs a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG`, defaulting to `warn`. Safe to call from every test.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
