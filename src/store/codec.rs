//! Per-record encode/decode (§4.B): `put_flow`/`get_flow`.

use std::io::{Read, Write};

use super::fields::{spec_for_bit, FIELD_TABLE};
use super::flow::{bits, Flow};
use super::header::read_exact_or_truncated;
use crate::error::StoreError;

/// Serializes the intersection of `flow.fields` and `allowed_mask` in
/// canonical (ascending bit) order. Address fields are emitted as whichever
/// AF variant the flow actually carries; callers must never pass a flow
/// whose `src_addr`/`dst_addr` families disagree (§4.B) — checked here with
/// a debug assertion per Design Note 3, the real filtering happens one
/// layer up in the collector (§7 tier 2).
pub fn put_flow<W: Write>(w: &mut W, flow: &Flow, allowed_mask: u32) -> Result<usize, StoreError> {
    debug_assert!(
        !(flow.has(bits::SRC_ADDR4) && flow.has(bits::SRC_ADDR6)),
        "programmer error: both SRC_ADDR4 and SRC_ADDR6 set"
    );
    debug_assert!(
        !(flow.has(bits::DST_ADDR4) && flow.has(bits::DST_ADDR6)),
        "programmer error: both DST_ADDR4 and DST_ADDR6 set"
    );
    debug_assert!(
        flow.addresses_consistent(),
        "flow with mismatched src/dst address families reached put_flow"
    );

    let selected = flow.fields & allowed_mask;
    let mut payload = Vec::new();

    for spec in FIELD_TABLE {
        if selected & spec.bit != 0 {
            (spec.encode)(flow, &mut payload);
        }
    }

    let mut out = Vec::with_capacity(4 + payload.len() + 4);
    out.extend_from_slice(&selected.to_be_bytes());
    out.extend_from_slice(&payload);

    if selected & bits::CRC32 != 0 {
        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_be_bytes());
    }

    w.write_all(&out)
        .map_err(|e| StoreError::WriteError(e.to_string()))?;
    Ok(out.len())
}

/// Deserializes one flow record. Returns `Ok(None)` on a clean end-of-file
/// (zero bytes available exactly at a record boundary); any other short
/// read is `Truncated`.
pub fn get_flow<R: Read>(r: &mut R) -> Result<Option<Flow>, StoreError> {
    let mut mask_buf = [0u8; 4];
    let n = read_some(r, &mut mask_buf)?;
    if n == 0 {
        return Ok(None);
    }
    if n != 4 {
        return Err(StoreError::Truncated { expected: 4, got: n });
    }
    let fields_word = u32::from_be_bytes(mask_buf);

    let mut flow = Flow::new();
    let mut crc_payload = Vec::new();
    crc_payload.extend_from_slice(&mask_buf);
    let mut stored_crc: Option<u32> = None;

    for bit_idx in 0..32u32 {
        let bit = 1u32 << bit_idx;
        if fields_word & bit == 0 {
            continue;
        }
        if bit == bits::CRC32 {
            let mut buf = [0u8; 4];
            read_exact_or_truncated(r, &mut buf)?;
            stored_crc = Some(u32::from_be_bytes(buf));
            continue;
        }
        if bit == bits::RESERVED {
            // Extension header slot, currently unused: recognized but
            // carries no payload (§3 supplement).
            continue;
        }
        match spec_for_bit(bit) {
            Some(spec) => {
                let mut buf = vec![0u8; spec.width];
                read_exact_or_truncated(r, &mut buf)?;
                (spec.decode)(&mut flow, &buf);
                crc_payload.extend_from_slice(&buf);
            }
            None => return Err(StoreError::UnknownField(bit)),
        }
    }

    if let Some(crc) = stored_crc {
        let expected = crc32fast::hash(&crc_payload);
        if expected != crc {
            return Err(StoreError::CrcError);
        }
        flow.crc32 = crc;
        flow.set(bits::CRC32);
    }

    Ok(Some(flow))
}

/// Like `read_exact` but tolerant of a zero-byte read at the very start
/// (clean EOF) — `Read::read` itself doesn't distinguish "nothing left" from
/// "got interrupted before anything arrived", so we peek one `read` call.
fn read_some<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize, StoreError> {
    loop {
        match r.read(buf) {
            Ok(0) => return Ok(0),
            Ok(n) => {
                if n == buf.len() {
                    return Ok(n);
                }
                read_exact_or_truncated(r, &mut buf[n..])?;
                return Ok(buf.len());
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StoreError::WriteError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Addr;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn sample_flow() -> Flow {
        let mut f = Flow::new();
        f.tag = 7;
        f.set(bits::TAG);
        f.recv_secs = 1234;
        f.set(bits::RECV_TIME);
        f.set_src_addr(Addr::from_v4([10, 0, 0, 1].into()));
        f.set_dst_addr(Addr::from_v4([10, 0, 0, 2].into()));
        f.octets = 1200;
        f.set(bits::OCTETS);
        f.packets = 7;
        f.set(bits::PACKETS);
        f
    }

    #[test]
    fn round_trip_respects_allowed_mask() {
        let flow = sample_flow();
        let allowed = bits::TAG | bits::SRCDST_ADDR | bits::OCTETS;

        let mut buf = Vec::new();
        put_flow(&mut buf, &flow, allowed).unwrap();

        let mut cur = Cursor::new(buf);
        let back = get_flow(&mut cur).unwrap().unwrap();

        assert_eq!(back.fields, flow.fields & allowed);
        assert_eq!(back.tag, 7);
        assert_eq!(back.src_addr, flow.src_addr);
        assert!(!back.has(bits::PACKETS));
    }

    #[test]
    fn canonical_order_independent_of_set_order() {
        let mut a = Flow::new();
        a.set(bits::TAG);
        a.tag = 1;
        a.set(bits::OCTETS);
        a.octets = 2;

        let mut b = Flow::new();
        b.set(bits::OCTETS);
        b.octets = 2;
        b.set(bits::TAG);
        b.tag = 1;

        let mut buf_a = Vec::new();
        let mut buf_b = Vec::new();
        put_flow(&mut buf_a, &a, bits::ALL).unwrap();
        put_flow(&mut buf_b, &b, bits::ALL).unwrap();
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn crc_flip_detected() {
        let flow = sample_flow();
        let mut buf = Vec::new();
        put_flow(&mut buf, &flow, bits::ALL).unwrap();

        let last = buf.len() - 1;
        buf[last] ^= 0xff;

        let mut cur = Cursor::new(buf);
        assert!(matches!(get_flow(&mut cur), Err(StoreError::CrcError)));
    }

    #[test]
    fn clean_eof_returns_none() {
        let mut cur = Cursor::new(Vec::<u8>::new());
        assert_eq!(get_flow(&mut cur).unwrap(), None);
    }

    #[test]
    fn short_mid_record_is_truncated() {
        let flow = sample_flow();
        let mut buf = Vec::new();
        put_flow(&mut buf, &flow, bits::ALL).unwrap();
        buf.truncate(buf.len() - 2);

        let mut cur = Cursor::new(buf);
        assert!(matches!(get_flow(&mut cur), Err(StoreError::Truncated { .. })));
    }

    #[test]
    fn unknown_bit_errors() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(1u32 << 20).to_be_bytes());
        let mut cur = Cursor::new(buf);
        assert!(matches!(get_flow(&mut cur), Err(StoreError::UnknownField(_))));
    }

    #[test]
    fn two_records_back_to_back_parse_cleanly() {
        let flow = sample_flow();
        let mut buf = Vec::new();
        put_flow(&mut buf, &flow, bits::ALL).unwrap();
        put_flow(&mut buf, &flow, bits::ALL).unwrap();

        let mut cur = Cursor::new(buf);
        let first = get_flow(&mut cur).unwrap().unwrap();
        let second = get_flow(&mut cur).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(get_flow(&mut cur).unwrap(), None);
    }

    proptest::proptest! {
        /// Invariant 2 (§8): for every `(flow, allowed_mask)`, `put_flow`
        /// then `get_flow` yields a flow whose `fields` is exactly the
        /// masked intersection and whose present fields equal the
        /// originals.
        #[test]
        fn prop_flow_round_trip(
            tag in any::<u32>(),
            recv_secs in any::<u32>(),
            octets in any::<u64>(),
            packets in any::<u64>(),
            allowed in any::<u32>(),
        ) {
            let mut flow = Flow::new();
            flow.tag = tag;
            flow.set(bits::TAG);
            flow.recv_secs = recv_secs;
            flow.set(bits::RECV_TIME);
            flow.octets = octets;
            flow.set(bits::OCTETS);
            flow.packets = packets;
            flow.set(bits::PACKETS);
            flow.set_src_addr(Addr::from_v4([10, 0, 0, 1].into()));
            flow.set_dst_addr(Addr::from_v4([10, 0, 0, 2].into()));

            let mut buf = Vec::new();
            put_flow(&mut buf, &flow, allowed).unwrap();
            let mut cur = Cursor::new(buf);
            let back = get_flow(&mut cur).unwrap().unwrap();

            prop_assert_eq!(back.fields, flow.fields & allowed);
            if back.has(bits::TAG) {
                prop_assert_eq!(back.tag, flow.tag);
            }
            if back.has(bits::OCTETS) {
                prop_assert_eq!(back.octets, flow.octets);
            }
            if back.has(bits::PACKETS) {
                prop_assert_eq!(back.packets, flow.packets);
            }
        }

        /// Invariant 3 (§8): the byte sequence for a `(fields, values)`
        /// pair doesn't depend on the order fields were set in.
        #[test]
        fn prop_canonical_order_independent_of_set_order(tag in any::<u32>(), octets in any::<u64>()) {
            let mut a = Flow::new();
            a.set(bits::OCTETS);
            a.octets = octets;
            a.set(bits::TAG);
            a.tag = tag;

            let mut b = Flow::new();
            b.set(bits::TAG);
            b.tag = tag;
            b.set(bits::OCTETS);
            b.octets = octets;

            let mut buf_a = Vec::new();
            let mut buf_b = Vec::new();
            put_flow(&mut buf_a, &a, bits::ALL).unwrap();
            put_flow(&mut buf_b, &b, bits::ALL).unwrap();
            prop_assert_eq!(buf_a, buf_b);
        }

        /// Invariant 4 (§8): flipping any single byte of a CRC-bearing
        /// record trips `CrcError`.
        #[test]
        fn prop_crc_detects_any_single_byte_flip(flip_idx in 0usize..40, tag in any::<u32>()) {
            let mut flow = sample_flow();
            flow.tag = tag;
            let mut buf = Vec::new();
            put_flow(&mut buf, &flow, bits::ALL).unwrap();

            let idx = flip_idx % buf.len();
            buf[idx] ^= 0xff;

            let mut cur = Cursor::new(buf);
            prop_assert!(matches!(get_flow(&mut cur), Err(StoreError::CrcError)));
        }
    }
}
