//! Peer device address.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Three-byte address of a device on the network.
///
/// Displayed as `1A.2B.3C`. Parsing accepts that form as well as the
/// undotted `1a2b3c`, in either case.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceAddress([u8; 3]);

impl DeviceAddress {
    /// Creates an address from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    /// Returns the address as a lowercase hex id without separators.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceAddress({self})")
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}.{:02X}.{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for DeviceAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let hex: String = s.chars().filter(|c| *c != '.').collect();
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(CoreError::invalid_address(s));
        }

        let mut bytes = [0u8; 3];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| CoreError::invalid_address(s))?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for DeviceAddress {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        value.parse()
    }
}

impl From<DeviceAddress> for String {
    fn from(address: DeviceAddress) -> Self {
        address.to_string()
    }
}

impl From<[u8; 3]> for DeviceAddress {
    fn from(bytes: [u8; 3]) -> Self {
        Self::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_and_dotted() {
        let plain: DeviceAddress = "1a2b3c".parse().unwrap();
        let dotted: DeviceAddress = "1A.2B.3C".parse().unwrap();
        assert_eq!(plain, dotted);
        assert_eq!(*plain.as_bytes(), [0x1a, 0x2b, 0x3c]);
    }

    #[test]
    fn display_and_id() {
        let address = DeviceAddress::from_bytes([0x01, 0x02, 0xab]);
        assert_eq!(address.to_string(), "01.02.AB");
        assert_eq!(address.id(), "0102ab");
        assert_eq!(format!("{address:?}"), "DeviceAddress(01.02.AB)");
    }

    #[test]
    fn rejects_bad_input() {
        assert!("".parse::<DeviceAddress>().is_err());
        assert!("12345".parse::<DeviceAddress>().is_err());
        assert!("1234567".parse::<DeviceAddress>().is_err());
        assert!("zz.zz.zz".parse::<DeviceAddress>().is_err());
        assert!("1é2b3".parse::<DeviceAddress>().is_err());
    }

    #[test]
    fn serde_as_string() {
        let address = DeviceAddress::from_bytes([0x0a, 0x0b, 0x0c]);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"0A.0B.0C\"");
        let back: DeviceAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
