//! Address-indexed record store.

use crate::record::{LinkRecord, LEGACY_HEAD_ADDR, RECORD_STRIDE};
use std::collections::btree_map::{self, BTreeMap};
use std::iter::Rev;
use tracing::trace;

/// Effect of storing a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// No record existed at the address.
    Inserted,
    /// A different record at the address was replaced.
    Updated,
    /// An identical record was already stored.
    Unchanged,
}

/// Where a descending walk from the head stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEnd {
    /// Neither head marker is present.
    NoHead,
    /// The chain reached the high-water mark at this address.
    HighWaterMark(u16),
    /// The record at this address is missing.
    Gap(u16),
    /// The walk ran past the bottom of the address space without a high-water mark.
    OutOfRange,
}

/// Coarse load state of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// No records at all.
    Empty,
    /// Some records, but no unbroken chain to the high-water mark.
    Partial,
    /// Every record from the head to the high-water mark is present.
    Loaded,
}

/// The local copy of a device's link database.
///
/// Records are keyed by memory address and iterate in ascending address
/// order; `iter().rev()` walks from the head downward. Storing a record only
/// ever replaces the entry at the same address.
#[derive(Debug, Clone)]
pub struct RecordStore {
    records: BTreeMap<u16, LinkRecord>,
    first_mem_addr: u16,
}

impl RecordStore {
    /// Creates an empty store for a device whose table starts at `first_mem_addr`.
    pub fn new(first_mem_addr: u16) -> Self {
        Self {
            records: BTreeMap::new(),
            first_mem_addr,
        }
    }

    /// Creates a store for a device using the legacy head address.
    pub fn with_legacy_head() -> Self {
        Self::new(LEGACY_HEAD_ADDR)
    }

    /// Returns the configured head address.
    pub fn first_mem_addr(&self) -> u16 {
        self.first_mem_addr
    }

    /// Stores a record, replacing any record at the same address.
    pub fn upsert(&mut self, record: LinkRecord) -> Upsert {
        match self.records.insert(record.mem_addr, record) {
            None => Upsert::Inserted,
            Some(previous) if previous == record => Upsert::Unchanged,
            Some(_) => {
                trace!("replaced record at {:#06x}", record.mem_addr);
                Upsert::Updated
            }
        }
    }

    /// Returns the record at `mem_addr`.
    pub fn get(&self, mem_addr: u16) -> Option<&LinkRecord> {
        self.records.get(&mem_addr)
    }

    /// Returns true if a record exists at `mem_addr`.
    pub fn contains(&self, mem_addr: u16) -> bool {
        self.records.contains_key(&mem_addr)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been received.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in ascending address order.
    pub fn iter(&self) -> btree_map::Values<'_, u16, LinkRecord> {
        self.records.values()
    }

    /// Iterates records from the highest address down.
    pub fn iter_desc(&self) -> Rev<btree_map::Values<'_, u16, LinkRecord>> {
        self.records.values().rev()
    }

    /// Stored addresses in ascending order.
    pub fn addresses(&self) -> impl Iterator<Item = u16> + '_ {
        self.records.keys().copied()
    }

    /// Returns the head address if a head record is present.
    ///
    /// The configured head wins over the legacy one when both exist.
    pub fn head_addr(&self) -> Option<u16> {
        [self.first_mem_addr, LEGACY_HEAD_ADDR]
            .into_iter()
            .find(|addr| self.contains(*addr))
    }

    /// Returns true if a head record is present.
    pub fn has_first_record(&self) -> bool {
        self.head_addr().is_some()
    }

    /// Walks down from the head one stride at a time until the chain ends.
    pub fn walk_chain(&self) -> ChainEnd {
        let Some(mut addr) = self.head_addr() else {
            return ChainEnd::NoHead;
        };
        loop {
            match self.records.get(&addr) {
                None => return ChainEnd::Gap(addr),
                Some(record) if record.is_high_water_mark() => {
                    return ChainEnd::HighWaterMark(addr)
                }
                Some(_) => {}
            }
            match next_below(addr) {
                Some(next) => addr = next,
                None => return ChainEnd::OutOfRange,
            }
        }
    }

    /// Completion predicate: an unbroken chain from the head to a high-water mark.
    pub fn is_loaded(&self) -> bool {
        matches!(self.walk_chain(), ChainEnd::HighWaterMark(_))
    }

    /// Returns the coarse load state.
    pub fn load_status(&self) -> LoadStatus {
        if self.is_empty() {
            LoadStatus::Empty
        } else if self.is_loaded() {
            LoadStatus::Loaded
        } else {
            LoadStatus::Partial
        }
    }

    /// Returns true if `count` consecutive records are present going down from `start`.
    ///
    /// A `start` of `0x0000` means "from the head". A `count` of zero is
    /// treated as one.
    pub fn contains_run(&self, start: u16, count: u16) -> bool {
        let start = if start == 0 {
            match self.head_addr() {
                Some(head) => head,
                None => return false,
            }
        } else {
            start
        };

        (0..u32::from(count.max(1))).all(|i| {
            u32::from(start)
                .checked_sub(i * u32::from(RECORD_STRIDE))
                .and_then(|addr| u16::try_from(addr).ok())
                .is_some_and(|addr| self.contains(addr))
        })
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::with_legacy_head()
    }
}

impl Extend<LinkRecord> for RecordStore {
    fn extend<I: IntoIterator<Item = LinkRecord>>(&mut self, iter: I) {
        for record in iter {
            self.upsert(record);
        }
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = &'a LinkRecord;
    type IntoIter = btree_map::Values<'a, u16, LinkRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Next record address below `addr`. `0x0000` is reserved for "first record" queries.
pub(crate) fn next_below(addr: u16) -> Option<u16> {
    addr.checked_sub(RECORD_STRIDE).filter(|next| *next != 0)
}
