//! IP address and prefix types with safe parsing.
//!
//! Both types serialize as their canonical string form so they can key
//! persisted tables.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Address family of an IP address or prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    V4,
    V6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => write!(f, "ipv4"),
            AddressFamily::V6 => write!(f, "ipv6"),
        }
    }
}

/// An IPv4 or IPv6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpAddress(IpAddr);

impl IpAddress {
    pub const V4_UNSPECIFIED: IpAddress = IpAddress(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    pub const V6_UNSPECIFIED: IpAddress = IpAddress(IpAddr::V6(Ipv6Addr::UNSPECIFIED));

    pub const fn v4(a: u8, b: u8, c: u8, d: u8) -> Self {
        IpAddress(IpAddr::V4(Ipv4Addr::new(a, b, c, d)))
    }

    pub const fn inner(&self) -> IpAddr {
        self.0
    }

    pub const fn family(&self) -> AddressFamily {
        match self.0 {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    pub const fn is_ipv4(&self) -> bool {
        matches!(self.0, IpAddr::V4(_))
    }

    pub const fn is_ipv6(&self) -> bool {
        matches!(self.0, IpAddr::V6(_))
    }

    pub fn is_unspecified(&self) -> bool {
        self.0.is_unspecified()
    }

    /// Returns true for fe80::/10 addresses.
    pub fn is_link_local(&self) -> bool {
        match self.0 {
            IpAddr::V4(addr) => addr.is_link_local(),
            IpAddr::V6(addr) => (addr.segments()[0] & 0xffc0) == 0xfe80,
        }
    }

    fn to_bits(self) -> u128 {
        match self.0 {
            IpAddr::V4(addr) => u32::from(addr) as u128,
            IpAddr::V6(addr) => u128::from(addr),
        }
    }

    const fn bit_width(&self) -> u8 {
        match self.0 {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }

    /// Zeroes every bit after the first `len` bits.
    fn masked(self, len: u8) -> IpAddress {
        let width = self.bit_width();
        let host_bits = u32::from(width - len.min(width));
        let mask = if host_bits >= 128 {
            0
        } else {
            !0u128 << host_bits
        };
        let bits = self.to_bits() & mask;
        match self.0 {
            IpAddr::V4(_) => IpAddress(IpAddr::V4(Ipv4Addr::from(bits as u32))),
            IpAddr::V6(_) => IpAddress(IpAddr::V6(Ipv6Addr::from(bits))),
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<IpAddr>()
            .map(IpAddress)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl TryFrom<String> for IpAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpAddress> for String {
    fn from(addr: IpAddress) -> String {
        addr.to_string()
    }
}

impl From<IpAddr> for IpAddress {
    fn from(addr: IpAddr) -> Self {
        IpAddress(addr)
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        IpAddress(IpAddr::V4(addr))
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(addr: Ipv6Addr) -> Self {
        IpAddress(IpAddr::V6(addr))
    }
}

/// An IP prefix in CIDR notation, stored in canonical (masked) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddress,
    prefix_len: u8,
}

impl IpPrefix {
    /// Creates a prefix, masking host bits off `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds the address width.
    pub fn new(address: IpAddress, prefix_len: u8) -> Result<Self, ParseError> {
        let max_len = address.bit_width();
        if prefix_len > max_len {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum {} for {}",
                prefix_len,
                max_len,
                address.family()
            )));
        }

        Ok(IpPrefix {
            address: address.masked(prefix_len),
            prefix_len,
        })
    }

    /// Host route covering exactly `address`.
    pub fn host(address: IpAddress) -> Self {
        IpPrefix {
            address,
            prefix_len: address.bit_width(),
        }
    }

    pub const fn address(&self) -> &IpAddress {
        &self.address
    }

    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub const fn family(&self) -> AddressFamily {
        self.address.family()
    }

    /// Returns true if `addr` falls inside this prefix.
    pub fn contains(&self, addr: &IpAddress) -> bool {
        addr.family() == self.family() && addr.masked(self.prefix_len) == self.address
    }

    pub fn is_default(&self) -> bool {
        self.prefix_len == 0
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;

        let address: IpAddress = addr_str.parse()?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        IpPrefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> String {
        prefix.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_family() {
        let v4: IpAddress = "10.0.0.1".parse().unwrap();
        let v6: IpAddress = "2001:db8::1".parse().unwrap();
        assert_eq!(v4.family(), AddressFamily::V4);
        assert_eq!(v6.family(), AddressFamily::V6);
        assert!(v4.is_ipv4());
        assert!(v6.is_ipv6());
    }

    #[test]
    fn test_link_local() {
        assert!("fe80::1".parse::<IpAddress>().unwrap().is_link_local());
        assert!(!"2001:db8::1".parse::<IpAddress>().unwrap().is_link_local());
    }

    #[test]
    fn test_prefix_is_canonical() {
        let prefix: IpPrefix = "10.1.2.3/16".parse().unwrap();
        assert_eq!(prefix.to_string(), "10.1.0.0/16");
        assert_eq!(prefix, "10.1.0.0/16".parse().unwrap());
    }

    #[test]
    fn test_prefix_contains() {
        let prefix: IpPrefix = "10.0.0.0/24".parse().unwrap();
        assert!(prefix.contains(&"10.0.0.77".parse().unwrap()));
        assert!(!prefix.contains(&"10.0.1.1".parse().unwrap()));
        assert!(!prefix.contains(&"::1".parse().unwrap()));

        let default: IpPrefix = "0.0.0.0/0".parse().unwrap();
        assert!(default.is_default());
        assert!(default.contains(&"192.168.1.1".parse().unwrap()));

        let v6: IpPrefix = "2001:db8::/32".parse().unwrap();
        assert!(v6.contains(&"2001:db8:ffff::1".parse().unwrap()));
    }

    #[test]
    fn test_host_prefix() {
        let host = IpPrefix::host(IpAddress::v4(10, 0, 0, 1));
        assert_eq!(host.prefix_len(), 32);
        assert_eq!(host.to_string(), "10.0.0.1/32");
    }

    #[test]
    fn test_invalid_prefix_length() {
        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
        assert!("2001:db8::/129".parse::<IpPrefix>().is_err());
        assert!("10.0.0.0".parse::<IpPrefix>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let prefix: IpPrefix = "192.168.0.0/16".parse().unwrap();
        let json = serde_json::to_string(&prefix).unwrap();
        assert_eq!(json, "\"192.168.0.0/16\"");
        let back: IpPrefix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, prefix);
    }
}
