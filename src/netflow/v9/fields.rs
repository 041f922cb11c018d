//! NetFlow v9 field-type registry and the allowed-length table
//! (`nf9_check_rec_len` in the original source).

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u16)]
pub enum NineFieldType {
    InBytes = 1,
    InPackets = 2,
    Protocol = 4,
    SrcTos = 5,
    TcpFlags = 6,
    L4SrcPort = 7,
    Ipv4SrcAddr = 8,
    SrcMask = 9,
    InputSnmp = 10,
    L4DstPort = 11,
    Ipv4DstAddr = 12,
    DstMask = 13,
    OutputSnmp = 14,
    Ipv4NextHop = 15,
    SrcAs = 16,
    DstAs = 17,
    LastSwitched = 21,
    FirstSwitched = 22,
    Ipv6SrcAddr = 27,
    Ipv6DstAddr = 28,
    Ipv6SrcMask = 29,
    Ipv6DstMask = 30,
    EngineType = 38,
    EngineId = 39,
    Ipv6NextHop = 62,
}

/// Classifies a raw `(type, len)` template field pair. Unknown types pass
/// the generic `0 < len ≤ 16 KiB` rule only (§4.E).
pub fn check_rec_len(field_type: u16, len: u16) -> bool {
    if len == 0 || len > 0x4000 {
        return false;
    }
    match NineFieldType::from_u16(field_type) {
        Some(NineFieldType::InBytes) | Some(NineFieldType::InPackets) => len <= 8,
        Some(NineFieldType::Protocol)
        | Some(NineFieldType::SrcTos)
        | Some(NineFieldType::TcpFlags)
        | Some(NineFieldType::SrcMask)
        | Some(NineFieldType::DstMask)
        | Some(NineFieldType::Ipv6SrcMask)
        | Some(NineFieldType::Ipv6DstMask)
        | Some(NineFieldType::EngineType)
        | Some(NineFieldType::EngineId) => len == 1,
        Some(NineFieldType::L4SrcPort) | Some(NineFieldType::L4DstPort) => len == 2,
        Some(NineFieldType::Ipv4SrcAddr) | Some(NineFieldType::Ipv4DstAddr) | Some(NineFieldType::Ipv4NextHop) => {
            len == 4
        }
        Some(NineFieldType::InputSnmp) | Some(NineFieldType::OutputSnmp) | Some(NineFieldType::SrcAs) | Some(NineFieldType::DstAs) => {
            len <= 2
        }
        Some(NineFieldType::LastSwitched) | Some(NineFieldType::FirstSwitched) => len <= 4,
        Some(NineFieldType::Ipv6SrcAddr) | Some(NineFieldType::Ipv6DstAddr) | Some(NineFieldType::Ipv6NextHop) => {
            len == 16
        }
        None => true,
    }
}

/// Copies `src` into the low-order (right-aligned) bytes of `dst`, matching
/// the original source's `BE_COPY` macro: exporters may send a field
/// narrower than its "natural" width, and since everything is big-endian
/// the short form is already numerically correct once zero-extended on the
/// left.
pub fn be_copy_into(dst: &mut [u8], src: &[u8]) {
    let start = dst.len().saturating_sub(src.len());
    dst[start..].copy_from_slice(&src[..dst.len() - start]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_type_enforces_exact_width() {
        assert!(check_rec_len(NineFieldType::Ipv4SrcAddr as u16, 4));
        assert!(!check_rec_len(NineFieldType::Ipv4SrcAddr as u16, 2));
    }

    #[test]
    fn known_type_allows_narrower_than_natural() {
        assert!(check_rec_len(NineFieldType::InBytes as u16, 2));
        assert!(check_rec_len(NineFieldType::InBytes as u16, 8));
        assert!(!check_rec_len(NineFieldType::InBytes as u16, 9));
    }

    #[test]
    fn unknown_type_uses_generic_bound() {
        assert!(check_rec_len(9999, 20));
        assert!(!check_rec_len(9999, 0));
        assert!(!check_rec_len(9999, 0x4001));
    }

    #[test]
    fn be_copy_right_aligns() {
        let mut dst = [0u8; 4];
        be_copy_into(&mut dst, &[0x01, 0x02]);
        assert_eq!(dst, [0, 0, 0x01, 0x02]);
    }
}
