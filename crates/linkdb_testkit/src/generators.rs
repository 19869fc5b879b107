//! Property-based test generators using proptest.
//!
//! Tables produced here always satisfy the device invariants: records sit
//! one stride apart going down from the head and the last one is the
//! high-water mark.

use linkdb_core::{ControlFlags, DeviceAddress, LinkRecord, RECORD_STRIDE};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for peer addresses.
pub fn device_address_strategy() -> impl Strategy<Value = DeviceAddress> {
    any::<[u8; 3]>().prop_map(DeviceAddress::from_bytes)
}

/// Strategy for flags of a record that is not the high-water mark.
pub fn active_flags_strategy() -> impl Strategy<Value = ControlFlags> {
    any::<u8>().prop_map(|byte| ControlFlags::from_byte(byte | 0b0000_0010))
}

/// Strategy for a non-terminal record at `mem_addr`.
pub fn link_record_strategy(mem_addr: u16) -> impl Strategy<Value = LinkRecord> {
    (
        active_flags_strategy(),
        any::<u8>(),
        device_address_strategy(),
        any::<[u8; 3]>(),
    )
        .prop_map(move |(flags, group, target, data)| LinkRecord {
            mem_addr,
            flags,
            group,
            target,
            data1: data[0],
            data2: data[1],
            data3: data[2],
        })
}

/// Strategy for a complete table below `head` with up to `max_active` records.
pub fn table_strategy(head: u16, max_active: u16) -> impl Strategy<Value = Vec<LinkRecord>> {
    (1..=max_active).prop_flat_map(move |active| {
        let records: Vec<_> = (0..active)
            .map(|i| link_record_strategy(head - i * RECORD_STRIDE))
            .collect();
        records.prop_map(move |mut records| {
            records.push(LinkRecord::high_water_mark(head - active * RECORD_STRIDE));
            records
        })
    })
}

/// Strategy for a table plus a set of its addresses lost in transit.
pub fn lossy_table_strategy(
    head: u16,
    max_active: u16,
) -> impl Strategy<Value = (Vec<LinkRecord>, BTreeSet<u16>)> {
    table_strategy(head, max_active).prop_flat_map(|table| {
        let addrs: Vec<u16> = table.iter().map(|r| r.mem_addr).collect();
        let len = addrs.len();
        (
            Just(table),
            prop::sample::subsequence(addrs, 0..len).prop_map(|lost| lost.into_iter().collect()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkdb_core::RecordStore;

    proptest! {
        #[test]
        fn generated_tables_are_complete(table in table_strategy(0x0fff, 32)) {
            let mut store = RecordStore::new(0x0fff);
            store.extend(table.iter().copied());
            prop_assert!(store.is_loaded());
            prop_assert_eq!(table.iter().filter(|r| r.is_high_water_mark()).count(), 1);
        }

        #[test]
        fn lost_addresses_belong_to_table((table, lost) in lossy_table_strategy(0x0fff, 16)) {
            prop_assert!(lost.len() < table.len());
            prop_assert!(lost.iter().all(|a| table.iter().any(|r| r.mem_addr == *a)));
        }
    }
}
