//! Newtype wrapper for IEEE 802 MAC addresses.
//!
//! Mesh destinations, next hops, and frame originators are all plain
//! 48-bit MAC addresses; the newtype keeps them from being confused with
//! arbitrary byte buffers and carries the EUI-64 link-local mapping used
//! by the UDP routing transport.

use core::fmt;
use core::str::FromStr;
use std::net::Ipv6Addr;

/// A 48-bit IEEE 802 MAC address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[must_use]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The all-ones broadcast address, `ff:ff:ff:ff:ff:ff`.
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// The raw octets.
    #[must_use = "returns the octets without modifying the address"]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Whether this is the broadcast address.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    /// Map this address to its EUI-64 IPv6 link-local form.
    ///
    /// The universal/local bit of the first octet is flipped and `ff:fe`
    /// is inserted in the middle of the interface identifier, matching
    /// what the kernel derives for the mesh interface itself.
    pub fn to_link_local(&self) -> Ipv6Addr {
        let m = self.0;
        Ipv6Addr::from([
            0xfe,
            0x80,
            0,
            0,
            0,
            0,
            0,
            0,
            m[0] ^ 0x02,
            m[1],
            m[2],
            0xff,
            0xfe,
            m[3],
            m[4],
            m[5],
        ])
    }

    /// Recover a MAC address from an EUI-64 IPv6 link-local address.
    ///
    /// Returns `None` when the address is not `fe80::/64` or its interface
    /// identifier was not derived from a MAC address.
    pub fn from_link_local(addr: Ipv6Addr) -> Option<Self> {
        let o = addr.octets();
        if o[0] != 0xfe || o[1] != 0x80 || o[2..8] != [0; 6] {
            return None;
        }
        if o[11] != 0xff || o[12] != 0xfe {
            return None;
        }
        Some(Self([o[8] ^ 0x02, o[9], o[10], o[13], o[14], o[15]]))
    }
}

impl AsRef<[u8]> for MacAddress {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for MacAddress {
    type Error = InvalidLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 6] = bytes.try_into().map_err(|_| InvalidLength {
            expected: 6,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    /// Parse the colon-separated form, e.g. `aa:bb:cc:dd:ee:ff`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in &mut bytes {
            let part = parts.next().ok_or(ParseMacError)?;
            if part.len() != 2 {
                return Err(ParseMacError);
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| ParseMacError)?;
        }
        if parts.next().is_some() {
            return Err(ParseMacError);
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

/// Error returned when a byte slice has the wrong length for a MAC address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLength {
    pub expected: usize,
    pub actual: usize,
}

impl fmt::Display for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid length: expected {} bytes, got {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for InvalidLength {}

/// Error returned when a MAC address string is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMacError;

impl fmt::Display for ParseMacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid MAC address syntax")
    }
}

impl std::error::Error for ParseMacError {}
