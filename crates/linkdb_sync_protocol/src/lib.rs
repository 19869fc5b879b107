//! # LinkDB Sync Protocol
//!
//! Vocabulary shared between the synchronization engine and a command channel.
//!
//! This crate provides:
//! - `ReadRequest` for read commands (start address, record count)
//! - `ChannelEvent` for what the channel reports back
//!
//! This is a pure protocol crate with no I/O operations. Message framing and
//! checksums belong to the channel implementation.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
mod request;

pub use error::{ProtocolError, ProtocolResult};
pub use event::ChannelEvent;
pub use request::{ReadKind, ReadRequest, MAX_RECORDS_PER_READ};
