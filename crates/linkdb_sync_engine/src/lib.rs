//! # LinkDB Sync Engine
//!
//! Synchronizes a device-resident link database over a lossy command channel.
//!
//! This crate provides:
//! - Whole-table reads with growing timers and a bounded retry budget
//! - Gap-directed single-record reads once the whole-table budget is spent
//! - Livelock detection when the same address keeps going missing
//! - A `CommandChannel` abstraction and a mock for tests
//!
//! ## Architecture
//!
//! The channel is fire-and-forget. Records arrive on its event stream at any
//! time and are stored immediately. A read pass never polls: it sends a
//! command, sleeps for the command's timer, and then asks the retry planner
//! what to do based on what the store holds by then.
//!
//! ## Key Invariants
//!
//! - Only one pass runs at a time; later passes queue in call order
//! - Every pass ends: each retry budget is finite
//! - Record arrivals are idempotent and may race timer expiry safely
//! - A pass reports how it ended; callers never infer it from the store

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod config;
mod error;
mod gap;
mod planner;
mod state;

pub use channel::{CommandChannel, MockChannel, Responder, SentCommand, DEFAULT_EVENT_CAPACITY};
pub use config::{
    RetryConfig, SyncConfig, DEFAULT_BASE_TIMER_TICKS, DEFAULT_READ_ALL_ATTEMPTS,
    DEFAULT_READ_ONE_RETRIES, DEFAULT_TIMER_INCREMENT_TICKS,
};
pub use error::{SyncError, SyncResult};
pub use gap::{next_missing_record, FIRST_RECORD_QUERY};
pub use planner::RetryCounters;
pub use state::{ReadHandle, ReadOutcome, ReadResult, SyncEngine, SyncState, SyncStats};
