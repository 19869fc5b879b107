//! Table fixtures.

use linkdb_core::{DeviceAddress, LinkRecord, RECORD_STRIDE};

/// An in-use record whose payload is derived from its address.
pub fn record(mem_addr: u16) -> LinkRecord {
    let [hi, lo] = mem_addr.to_be_bytes();
    LinkRecord::new(
        mem_addr,
        mem_addr % 16 == 15,
        lo,
        DeviceAddress::from_bytes([0x1a, hi, lo]),
        [0xff, 0x1f, 0x01],
    )
}

/// A table of `active` records going down from `head`, closed by a high-water mark.
///
/// # Panics
///
/// Panics if the table does not fit below `head`.
pub fn contiguous_table(head: u16, active: u16) -> Vec<LinkRecord> {
    let mut records: Vec<_> = (0..active)
        .map(|i| record(head - i * RECORD_STRIDE))
        .collect();
    records.push(LinkRecord::high_water_mark(head - active * RECORD_STRIDE));
    records
}

/// Serializes a table for golden files.
pub fn table_to_json(records: &[LinkRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

/// Loads a table written by [`table_to_json`].
pub fn table_from_json(json: &str) -> serde_json::Result<Vec<LinkRecord>> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_table_shape() {
        let table = contiguous_table(0x0fff, 3);
        let addrs: Vec<_> = table.iter().map(|r| r.mem_addr).collect();
        assert_eq!(addrs, vec![0x0fff, 0x0ff7, 0x0fef, 0x0fe7]);
        assert!(table[..3].iter().all(|r| !r.is_high_water_mark()));
        assert!(table[3].is_high_water_mark());
    }

    #[test]
    fn json_golden() {
        let json = r#"[
            {"mem_addr": 4095, "flags": 226, "group": 1, "target": "1A.2B.3C",
             "data1": 255, "data2": 28, "data3": 1},
            {"mem_addr": 4087, "flags": 0, "group": 0, "target": "00.00.00",
             "data1": 0, "data2": 0, "data3": 0}
        ]"#;
        let table = table_from_json(json).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table[0].flags.is_controller());
        assert_eq!(table[0].target.to_string(), "1A.2B.3C");
        assert!(table[1].is_high_water_mark());

        let again = table_from_json(&table_to_json(&table).unwrap()).unwrap();
        assert_eq!(again, table);
    }
}
