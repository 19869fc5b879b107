//! Read commands.

use crate::error::{ProtocolError, ProtocolResult};
use linkdb_core::RecordStore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest record count a single read command carries.
pub const MAX_RECORDS_PER_READ: u16 = 0xFF;

/// Which read strategy a request expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadKind {
    /// Dump the whole table.
    All,
    /// Read a run of records from a start address.
    Range,
}

/// A read command sent to the device.
///
/// `mem_addr == 0x0000` with `num_recs == 0` asks for the whole table.
/// Any other combination reads `num_recs` records starting at `mem_addr`,
/// where `0x0000` addresses the device's first record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Start address.
    pub mem_addr: u16,
    /// Number of records; zero with address zero means all.
    pub num_recs: u16,
}

impl ReadRequest {
    /// Creates a read request.
    pub fn new(mem_addr: u16, num_recs: u16) -> ProtocolResult<Self> {
        if num_recs > MAX_RECORDS_PER_READ {
            return Err(ProtocolError::CountTooLarge {
                count: num_recs,
                max: MAX_RECORDS_PER_READ,
            });
        }
        Ok(Self { mem_addr, num_recs })
    }

    /// Request for the entire table.
    pub const fn all() -> Self {
        Self {
            mem_addr: 0x0000,
            num_recs: 0,
        }
    }

    /// Request for the single record at `mem_addr`.
    pub const fn one(mem_addr: u16) -> Self {
        Self {
            mem_addr,
            num_recs: 1,
        }
    }

    /// Returns the read strategy.
    pub fn kind(&self) -> ReadKind {
        if self.mem_addr == 0x0000 && self.num_recs == 0 {
            ReadKind::All
        } else {
            ReadKind::Range
        }
    }

    /// Returns true if this is a whole-table read.
    pub fn is_read_all(&self) -> bool {
        self.kind() == ReadKind::All
    }

    /// Returns true once the store holds what a range read asked for.
    ///
    /// A whole-table read is satisfied by the store's completion predicate.
    pub fn is_satisfied_by(&self, store: &RecordStore) -> bool {
        match self.kind() {
            ReadKind::All => store.is_loaded(),
            ReadKind::Range => store.contains_run(self.mem_addr, self.num_recs),
        }
    }
}

impl fmt::Debug for ReadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ReadKind::All => write!(f, "ReadRequest(all)"),
            ReadKind::Range => write!(f, "ReadRequest({:#06x} x{})", self.mem_addr, self.num_recs),
        }
    }
}
