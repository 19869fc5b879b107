//! Link database records.

use crate::address::DeviceAddress;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of the table head on devices that predate configurable heads.
pub const LEGACY_HEAD_ADDR: u16 = 0x0FFF;

/// Address spacing between consecutive records.
pub const RECORD_STRIDE: u16 = 8;

/// Size of an encoded record body in bytes.
pub const RECORD_SIZE: usize = 8;

const IN_USE: u8 = 0b1000_0000;
const CONTROLLER: u8 = 0b0100_0000;
const USED_BEFORE: u8 = 0b0000_0010;

/// Control flags of a link record.
///
/// Bit layout:
/// - bit 7: record in use
/// - bit 6: controller (clear means responder)
/// - bit 1: record has been used before; clear marks the high-water mark
///
/// Remaining bits are preserved but carry no meaning here.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct ControlFlags(u8);

impl ControlFlags {
    /// Creates flags from their raw byte.
    #[inline]
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Returns the raw byte.
    #[inline]
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self.0
    }

    /// Flags for an in-use record.
    #[must_use]
    pub const fn active(is_controller: bool) -> Self {
        let mut byte = IN_USE | USED_BEFORE;
        if is_controller {
            byte |= CONTROLLER;
        }
        Self(byte)
    }

    /// Flags for the terminal high-water-mark record.
    #[must_use]
    pub const fn high_water_mark() -> Self {
        Self(0)
    }

    /// Returns true if the record slot is in use.
    #[must_use]
    pub const fn is_in_use(self) -> bool {
        self.0 & IN_USE != 0
    }

    /// Returns true if the device is the controller of the link.
    #[must_use]
    pub const fn is_controller(self) -> bool {
        self.0 & CONTROLLER != 0
    }

    /// Returns true if no records exist beyond this one.
    #[must_use]
    pub const fn is_high_water_mark(self) -> bool {
        self.0 & USED_BEFORE == 0
    }
}

impl fmt::Debug for ControlFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlFlags")
            .field("in_use", &self.is_in_use())
            .field("controller", &self.is_controller())
            .field("high_water_mark", &self.is_high_water_mark())
            .finish()
    }
}

impl From<u8> for ControlFlags {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl From<ControlFlags> for u8 {
    fn from(flags: ControlFlags) -> Self {
        flags.to_byte()
    }
}

/// A single record of the link database.
///
/// Only `mem_addr` and the high-water-mark flag matter for synchronization;
/// the rest of the payload is carried as received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Memory address of the record on the device.
    pub mem_addr: u16,
    /// Control flags.
    pub flags: ControlFlags,
    /// Link group number.
    pub group: u8,
    /// Peer device of the link.
    pub target: DeviceAddress,
    /// First application data byte.
    pub data1: u8,
    /// Second application data byte.
    pub data2: u8,
    /// Third application data byte.
    pub data3: u8,
}

impl LinkRecord {
    /// Creates an in-use record.
    pub fn new(
        mem_addr: u16,
        is_controller: bool,
        group: u8,
        target: DeviceAddress,
        data: [u8; 3],
    ) -> Self {
        Self {
            mem_addr,
            flags: ControlFlags::active(is_controller),
            group,
            target,
            data1: data[0],
            data2: data[1],
            data3: data[2],
        }
    }

    /// Creates the empty terminal record at `mem_addr`.
    pub fn high_water_mark(mem_addr: u16) -> Self {
        Self {
            mem_addr,
            flags: ControlFlags::high_water_mark(),
            group: 0,
            target: DeviceAddress::default(),
            data1: 0,
            data2: 0,
            data3: 0,
        }
    }

    /// Returns true if this record terminates the table.
    #[inline]
    pub fn is_high_water_mark(&self) -> bool {
        self.flags.is_high_water_mark()
    }

    /// Encodes the record body.
    ///
    /// Layout: flags, group, target (3 bytes), data1, data2, data3.
    /// The memory address is not part of the body.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let target = self.target.as_bytes();
        [
            self.flags.to_byte(),
            self.group,
            target[0],
            target[1],
            target[2],
            self.data1,
            self.data2,
            self.data3,
        ]
    }

    /// Decodes a record body read from `mem_addr`.
    pub fn from_bytes(mem_addr: u16, bytes: &[u8]) -> CoreResult<Self> {
        let [flags, group, t0, t1, t2, data1, data2, data3]: [u8; RECORD_SIZE] =
            bytes.try_into().map_err(|_| CoreError::InvalidRecordLength {
                expected: RECORD_SIZE,
                actual: bytes.len(),
            })?;

        Ok(Self {
            mem_addr,
            flags: ControlFlags::from_byte(flags),
            group,
            target: DeviceAddress::from_bytes([t0, t1, t2]),
            data1,
            data2,
            data3,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits() {
        let controller = ControlFlags::active(true);
        assert!(controller.is_in_use());
        assert!(controller.is_controller());
        assert!(!controller.is_high_water_mark());
        assert_eq!(controller.to_byte(), 0xc2);

        let responder = ControlFlags::active(false);
        assert!(!responder.is_controller());
        assert_eq!(responder.to_byte(), 0x82);

        let hwm = ControlFlags::high_water_mark();
        assert!(hwm.is_high_water_mark());
        assert!(!hwm.is_in_use());
    }

    #[test]
    fn unused_record_that_was_used_before_is_not_hwm() {
        // Deleted links keep bit 1 set.
        let deleted = ControlFlags::from_byte(0x02);
        assert!(!deleted.is_in_use());
        assert!(!deleted.is_high_water_mark());
    }

    #[test]
    fn record_body_layout() {
        let target = DeviceAddress::from_bytes([0x1a, 0x2b, 0x3c]);
        let record = LinkRecord::new(0x0fff, true, 1, target, [0xff, 0x1f, 0x01]);
        let bytes = record.to_bytes();
        assert_eq!(bytes, [0xc2, 0x01, 0x1a, 0x2b, 0x3c, 0xff, 0x1f, 0x01]);

        let decoded = LinkRecord::from_bytes(0x0fff, &bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        let err = LinkRecord::from_bytes(0x0fff, &[0u8; 7]).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidRecordLength {
                expected: 8,
                actual: 7
            }
        );
        assert!(LinkRecord::from_bytes(0x0fff, &[0u8; 9]).is_err());
    }

    #[test]
    fn high_water_mark_record() {
        let record = LinkRecord::high_water_mark(0x0fe7);
        assert!(record.is_high_water_mark());
        assert_eq!(record.to_bytes(), [0u8; 8]);
    }

    #[test]
    fn serde_shape() {
        let record = LinkRecord::high_water_mark(0x0ff7);
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["mem_addr"], 0x0ff7);
        assert_eq!(json["flags"], 0);
        assert_eq!(json["target"], "00.00.00");
    }
}
