//! Normalized address value (§3, §4.A).
//!
//! `Addr` is a tagged union rather than a bare `IpAddr`: the AF tag must
//! survive even when the underlying bytes happen to be all zero (an
//! "empty" `V4` is not the same value as `Empty`), which matters for the
//! store codec's mutually-exclusive `*_ADDR4`/`*_ADDR6` bits (§6).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use ipnetwork::IpNetwork;

use crate::error::AddrError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Addr {
    Empty,
    V4([u8; 4]),
    V6([u8; 16]),
}

impl Addr {
    pub fn from_v4(a: Ipv4Addr) -> Self {
        Addr::V4(a.octets())
    }

    pub fn from_v6(a: Ipv6Addr) -> Self {
        Addr::V6(a.octets())
    }

    /// AF tag as used by the store codec's per-bit family selection.
    pub fn is_v4(&self) -> bool {
        matches!(self, Addr::V4(_))
    }

    pub fn is_v6(&self) -> bool {
        matches!(self, Addr::V6(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Addr::Empty)
    }

    /// Two addresses are of the same family iff both tags match; `Empty`
    /// only matches `Empty`. Used by the AF-mismatch invariant (§3).
    pub fn same_family(&self, other: &Addr) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn to_ip_addr(&self) -> Option<IpAddr> {
        match self {
            Addr::Empty => None,
            Addr::V4(b) => Some(IpAddr::V4(Ipv4Addr::from(*b))),
            Addr::V6(b) => Some(IpAddr::V6(Ipv6Addr::from(*b))),
        }
    }

    /// Parse `IPv4`/`IPv6` text, optionally followed by `/prefix`, returning
    /// the address and the prefix length (defaulting to the full width).
    pub fn parse_cidr(s: &str) -> Result<(Addr, u8), AddrError> {
        let net = IpNetwork::from_str(s).or_else(|_| {
            IpAddr::from_str(s)
                .map(|ip| IpNetwork::new(ip, full_prefix(&ip)).unwrap())
                .map_err(|_| AddrError::BadAddress(s.to_string()))
        })?;
        let addr = match net.ip() {
            IpAddr::V4(a) => Addr::from_v4(a),
            IpAddr::V6(a) => Addr::from_v6(a),
        };
        Ok((addr, net.prefix()))
    }

    /// Textual presentation, matching `addr_ntop` in the original C source.
    pub fn to_text(&self) -> String {
        match self.to_ip_addr() {
            Some(ip) => ip.to_string(),
            None => "none".to_string(),
        }
    }

    /// Compare two addresses for equality, optionally under a prefix mask.
    /// `None` prefix means exact match; mismatched families never match.
    pub fn eq_masked(&self, other: &Addr, prefix: Option<u8>) -> bool {
        match (self.to_ip_addr(), other.to_ip_addr(), prefix) {
            (Some(a), Some(b), None) => a == b,
            (Some(a), Some(b), Some(p)) => {
                let net = match IpNetwork::new(a, p) {
                    Ok(n) => n,
                    Err(_) => return false,
                };
                net.contains(b)
            }
            (None, None, _) => true,
            _ => false,
        }
    }
}

impl From<SocketAddr> for Addr {
    fn from(sa: SocketAddr) -> Self {
        match sa.ip() {
            IpAddr::V4(a) => Addr::from_v4(a),
            IpAddr::V6(a) => Addr::from_v6(a),
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

fn full_prefix(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Byte-swap helpers for the 64-bit fields the store codec writes in network
/// byte order; these mirror `store_ntohll`/`store_htonll` from
/// `original_source/store.h` and are endian-representation independent.
#[inline]
pub fn htonll(v: u64) -> u64 {
    v.to_be()
}

#[inline]
pub fn ntohll(v: u64) -> u64 {
    u64::from_be(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_v4_and_v6() {
        let (a, p) = Addr::parse_cidr("10.0.0.1").unwrap();
        assert_eq!(a, Addr::from_v4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(p, 32);

        let (a, p) = Addr::parse_cidr("fe80::1/64").unwrap();
        assert!(a.is_v6());
        assert_eq!(p, 64);
    }

    #[test]
    fn bad_address_errors() {
        assert_eq!(
            Addr::parse_cidr("not-an-address"),
            Err(AddrError::BadAddress("not-an-address".to_string()))
        );
    }

    #[test]
    fn family_tag_survives_zero_bytes() {
        let zero_v4 = Addr::V4([0, 0, 0, 0]);
        assert!(zero_v4.is_v4());
        assert!(!zero_v4.is_empty());
        assert!(!zero_v4.same_family(&Addr::Empty));
    }

    #[test]
    fn masked_equality() {
        let a = Addr::from_v4(Ipv4Addr::new(10, 0, 0, 5));
        let b = Addr::from_v4(Ipv4Addr::new(10, 0, 0, 200));
        assert!(a.eq_masked(&b, Some(24)));
        assert!(!a.eq_masked(&b, None));
    }

    #[test]
    fn round_trip_ntohll() {
        let v: u64 = 0x0102_0304_0506_0708;
        assert_eq!(ntohll(htonll(v)), v);
    }
}
