//! Gap detection over a partially received table.

use linkdb_core::{ChainEnd, RecordStore};

/// Address the device answers with its first record.
pub const FIRST_RECORD_QUERY: u16 = 0x0000;

/// Finds the next address worth asking for.
///
/// Walks down from the head one stride at a time and returns the first
/// address with no record; when the chain is unbroken that is the slot just
/// below the lowest record.
///
/// Without a head record the device is asked for its first record at
/// `0x0000`, unless `force_head` is set, in which case the configured head
/// address is targeted directly.
///
/// Returns `None` when there is nothing left to ask for: either the chain
/// reached a high-water mark, or it ran out of address space without one.
pub fn next_missing_record(store: &RecordStore, force_head: bool) -> Option<u16> {
    match store.walk_chain() {
        ChainEnd::NoHead if force_head => Some(store.first_mem_addr()),
        ChainEnd::NoHead => Some(FIRST_RECORD_QUERY),
        ChainEnd::Gap(addr) => Some(addr),
        ChainEnd::HighWaterMark(_) | ChainEnd::OutOfRange => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkdb_core::{DeviceAddress, LinkRecord, RECORD_STRIDE};
    use proptest::prelude::*;

    fn rec(mem_addr: u16) -> LinkRecord {
        LinkRecord::new(mem_addr, false, 0, DeviceAddress::from_bytes([4, 5, 6]), [0; 3])
    }

    fn store_with(first_mem_addr: u16, addrs: &[u16]) -> RecordStore {
        let mut store = RecordStore::new(first_mem_addr);
        store.extend(addrs.iter().map(|a| rec(*a)));
        store
    }

    #[test]
    fn next_below_two_records() {
        let store = store_with(0x0fff, &[0x0fff, 0x0ff7]);
        assert_eq!(next_missing_record(&store, false), Some(0x0fef));
    }

    #[test]
    fn interior_gap_wins_over_tail() {
        let store = store_with(0x0fff, &[0x0fff, 0x0ff7, 0x0fe7, 0x0fdf]);
        assert_eq!(next_missing_record(&store, false), Some(0x0fef));
    }

    #[test]
    fn missing_head_asks_for_first_record() {
        let store = store_with(0x0fff, &[0x0ff7]);
        assert_eq!(next_missing_record(&store, false), Some(0x0000));
        assert_eq!(next_missing_record(&RecordStore::new(0x0fff), false), Some(0x0000));
    }

    #[test]
    fn forced_head_targets_configured_head() {
        let store = RecordStore::new(0x1fff);
        assert_eq!(next_missing_record(&store, true), Some(0x1fff));
    }

    #[test]
    fn legacy_head_is_accepted() {
        let store = store_with(0x1fff, &[0x0fff]);
        assert_eq!(next_missing_record(&store, true), Some(0x0ff7));
    }

    #[test]
    fn high_water_mark_ends_search() {
        let mut store = store_with(0x0fff, &[0x0fff, 0x0ff7]);
        store.upsert(LinkRecord::high_water_mark(0x0fef));
        assert_eq!(next_missing_record(&store, false), None);
    }

    #[test]
    fn exhausted_address_space_ends_search() {
        let store = store_with(0x0010, &[0x0010, 0x0008]);
        assert_eq!(next_missing_record(&store, false), None);
    }

    proptest! {
        #[test]
        fn finds_the_single_missing_record(len in 2u16..60, pick in any::<prop::sample::Index>()) {
            let addrs: Vec<u16> = (0..len).map(|i| 0x0fff - i * RECORD_STRIDE).collect();
            let removed = addrs[1 + pick.index(addrs.len() - 1)];
            let kept: Vec<u16> = addrs.iter().copied().filter(|a| *a != removed).collect();
            let store = store_with(0x0fff, &kept);
            prop_assert_eq!(next_missing_record(&store, false), Some(removed));
        }
    }
}
