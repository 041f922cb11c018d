//! NetFlow v1 decoder (§4.E): the oldest fixed-layout variant — no AS,
//! engine, or gateway-v6 information, IPv4 addresses only.

use crate::addr::Addr;
use crate::error::DecodeError;
use crate::store::{bits, Flow};

use super::{read_u16, read_u32, NF1_MAXFLOWS};

pub const VERSION: u16 = 1;

pub const HEADER_SIZE: usize = 16;
pub const RECORD_SIZE: usize = 48;

pub fn decode(buf: &[u8]) -> Result<Vec<Flow>, DecodeError> {
    if buf.len() < HEADER_SIZE {
        return Err(DecodeError::ShortPacket { expected: HEADER_SIZE, got: buf.len() });
    }

    let count = read_u16(buf, 2);
    if count == 0 {
        return Err(DecodeError::ZeroCount(0));
    }
    if count > NF1_MAXFLOWS {
        return Err(DecodeError::TooManyFlows { got: count as usize, max: NF1_MAXFLOWS as usize });
    }
    let expected_len = HEADER_SIZE + count as usize * RECORD_SIZE;
    if buf.len() != expected_len {
        return Err(DecodeError::LengthMismatch { len: buf.len() });
    }

    let uptime_ms = read_u32(buf, 4);
    let time_sec = read_u32(buf, 8);
    let time_nanosec = read_u32(buf, 12);

    let mut flows = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let rec = &buf[HEADER_SIZE + i * RECORD_SIZE..HEADER_SIZE + (i + 1) * RECORD_SIZE];
        flows.push(decode_record(rec, uptime_ms, time_sec, time_nanosec));
    }
    Ok(flows)
}

fn decode_record(rec: &[u8], uptime_ms: u32, time_sec: u32, time_nanosec: u32) -> Flow {
    let mut f = Flow::new();

    f.set_src_addr(Addr::V4(rec[0..4].try_into().unwrap()));
    f.set_dst_addr(Addr::V4(rec[4..8].try_into().unwrap()));
    f.set_gateway_addr(Addr::V4(rec[8..12].try_into().unwrap()));

    f.if_in = read_u16(rec, 12);
    f.if_out = read_u16(rec, 14);
    f.set(bits::IF_INDICES);

    f.packets = read_u32(rec, 16) as u64;
    f.octets = read_u32(rec, 20) as u64;
    f.set(bits::PACKETS);
    f.set(bits::OCTETS);

    f.flow_start = read_u32(rec, 24);
    f.flow_finish = read_u32(rec, 28);
    f.set(bits::FLOW_TIMES);

    f.src_port = read_u16(rec, 32);
    f.dst_port = read_u16(rec, 34);
    f.set(bits::SRCDST_PORT);

    f.tcp_flags = rec[38];
    f.proto = rec[39];
    f.tos = rec[40];
    f.set(bits::PROTO_FLAGS_TOS);

    f.sys_uptime_ms = uptime_ms;
    f.time_sec = time_sec;
    f.time_nanosec = time_nanosec;
    f.set(bits::AGENT_INFO);

    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_header(count: u16) -> Vec<u8> {
        let mut h = Vec::with_capacity(HEADER_SIZE);
        h.extend_from_slice(&VERSION.to_be_bytes());
        h.extend_from_slice(&count.to_be_bytes());
        h.extend_from_slice(&100u32.to_be_bytes());
        h.extend_from_slice(&1_700_000_000u32.to_be_bytes());
        h.extend_from_slice(&0u32.to_be_bytes());
        h
    }

    fn sample_record() -> Vec<u8> {
        let mut r = vec![0u8; RECORD_SIZE];
        r[0..4].copy_from_slice(&[10, 0, 0, 1]);
        r[4..8].copy_from_slice(&[10, 0, 0, 2]);
        r[16..20].copy_from_slice(&7u32.to_be_bytes());
        r[20..24].copy_from_slice(&1400u32.to_be_bytes());
        r[32..34].copy_from_slice(&1234u16.to_be_bytes());
        r[34..36].copy_from_slice(&80u16.to_be_bytes());
        r[39] = 6;
        r
    }

    #[test]
    fn decodes_single_record() {
        let mut buf = sample_header(1);
        buf.extend(sample_record());

        let flows = decode(&buf).unwrap();
        assert_eq!(flows.len(), 1);
        let f = &flows[0];
        assert_eq!(f.src_addr, Addr::V4([10, 0, 0, 1]));
        assert_eq!(f.packets, 7);
        assert_eq!(f.octets, 1400);
        assert_eq!(f.proto, 6);
        assert_eq!(f.dst_port, 80);
        assert!(!f.has(bits::AS_INFO));
    }

    #[test]
    fn rejects_zero_count() {
        let buf = sample_header(0);
        assert!(matches!(decode(&buf), Err(DecodeError::ZeroCount(_))));
    }
}
