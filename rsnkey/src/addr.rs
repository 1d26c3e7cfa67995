// IEEE 802 MAC addresses.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RsnKeyError};

/// A 48-bit IEEE 802 MAC address.
///
/// Ordering is lexicographic over the octets, which is what the PTK
/// derivation's Min/Max address ordering requires.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const LEN: usize = 6;
    pub const ZERO: MacAddr = MacAddr([0u8; 6]);
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let octets: [u8; 6] = bytes.try_into().map_err(|_| RsnKeyError::LengthMismatch {
            what: "MAC address",
            declared: 6,
            available: bytes.len(),
        })?;
        Ok(MacAddr(octets))
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 6]
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        MacAddr(octets)
    }
}

impl AsRef<[u8]> for MacAddr {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_colon_separated_lowercase() {
        let addr = MacAddr([0x02, 0xAB, 0x00, 0x10, 0xfe, 0x01]);
        assert_eq!(addr.to_string(), "02:ab:00:10:fe:01");
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(MacAddr::from_slice(&[1, 2, 3]).is_err());
        assert_eq!(
            MacAddr::from_slice(&[1, 2, 3, 4, 5, 6]).unwrap(),
            MacAddr([1, 2, 3, 4, 5, 6])
        );
    }

    #[test]
    fn ordering_is_octet_lexicographic() {
        let a = MacAddr([0x00, 0xff, 0xff, 0xff, 0xff, 0xff]);
        let b = MacAddr([0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert!(a < b);
    }
}
