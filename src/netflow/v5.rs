//! NetFlow v5 decoder (§4.E), generalized from the fixed-layout header +
//! 48-byte `DataSet` shape.

use crate::addr::Addr;
use crate::error::DecodeError;
use crate::store::{bits, Flow};

use super::{read_u16, read_u32, NF5_MAXFLOWS};

pub const VERSION: u16 = 5;

pub const HEADER_SIZE: usize = 24;
pub const RECORD_SIZE: usize = 48;

pub fn decode(buf: &[u8]) -> Result<Vec<Flow>, DecodeError> {
    if buf.len() < HEADER_SIZE {
        return Err(DecodeError::ShortPacket { expected: HEADER_SIZE, got: buf.len() });
    }

    let count = read_u16(buf, 2);
    if count == 0 {
        return Err(DecodeError::ZeroCount(0));
    }
    if count > NF5_MAXFLOWS {
        return Err(DecodeError::TooManyFlows { got: count as usize, max: NF5_MAXFLOWS as usize });
    }
    let expected_len = HEADER_SIZE + count as usize * RECORD_SIZE;
    if buf.len() != expected_len {
        return Err(DecodeError::LengthMismatch { len: buf.len() });
    }

    let uptime_ms = read_u32(buf, 4);
    let time_sec = read_u32(buf, 8);
    let time_nanosec = read_u32(buf, 12);
    let engine_type = buf[20];
    let engine_id = buf[21];
    let flow_sequence = read_u32(buf, 16);

    let mut flows = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let rec = &buf[HEADER_SIZE + i * RECORD_SIZE..HEADER_SIZE + (i + 1) * RECORD_SIZE];
        flows.push(decode_record(rec, uptime_ms, time_sec, time_nanosec, engine_type, engine_id, flow_sequence));
    }
    Ok(flows)
}

fn decode_record(
    rec: &[u8],
    uptime_ms: u32,
    time_sec: u32,
    time_nanosec: u32,
    engine_type: u8,
    engine_id: u8,
    flow_sequence: u32,
) -> Flow {
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

    f.tcp_flags = rec[37];
    f.proto = rec[38];
    f.tos = rec[39];
    f.set(bits::PROTO_FLAGS_TOS);

    f.src_as = read_u16(rec, 40);
    f.dst_as = read_u16(rec, 42);
    f.src_mask = rec[44];
    f.dst_mask = rec[45];
    f.set(bits::AS_INFO);

    f.engine_type = engine_type;
    f.engine_id = engine_id;
    f.flow_sequence = flow_sequence;
    f.set(bits::FLOW_ENGINE_INFO);

    f.sys_uptime_ms = uptime_ms;
    f.time_sec = time_sec;
    f.time_nanosec = time_nanosec;
    f.set(bits::AGENT_INFO);

    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use pretty_assertions::assert_eq;

    const HEADER: [u8; HEADER_SIZE] = hex!(
        "00 05 00 01 00 00 04 b2 60 80 b8 9c 1a 47 ff 30
         00 00 00 02 01 00 00 00"
    );
    const RECORD: [u8; RECORD_SIZE] = hex!(
        "70 0a 14 0a ac 1e be 0a ac c7 0f 01 00 00 00 00
         00 00 03 1b 00 00 01 03 00 00 02 36 00 00 03 a8
         00 28 00 50 00 00 06 00 c3 0d 35 bd 15 1a 00 00"
    );

    fn datagram() -> Vec<u8> {
        let mut buf = HEADER.to_vec();
        buf.extend_from_slice(&RECORD);
        buf
    }

    #[test]
    fn decodes_single_record() {
        let flows = decode(&datagram()).unwrap();
        assert_eq!(flows.len(), 1);
        let f = &flows[0];
        assert_eq!(f.src_addr, Addr::V4([112, 10, 20, 10]));
        assert_eq!(f.dst_addr, Addr::V4([172, 30, 190, 10]));
        assert_eq!(f.octets, 795);
        assert_eq!(f.packets, 259);
        assert_eq!(f.proto, 6);
        assert_eq!(f.src_port, 40);
        assert_eq!(f.dst_port, 80);
        assert_eq!(f.engine_type, 1);
        assert_eq!(f.flow_sequence, 2);
        assert_eq!(f.sys_uptime_ms, 0x0000_04b2);
        assert_eq!(f.time_sec, 0x6080_b89c);
        assert_eq!(f.time_nanosec, 0x1a47_ff30);
        assert!(f.has(bits::AGENT_INFO));
    }

    #[test]
    fn rejects_zero_count() {
        let mut buf = HEADER.to_vec();
        buf[2] = 0;
        buf[3] = 0;
        assert!(matches!(decode(&buf), Err(DecodeError::ZeroCount(_))));
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut buf = datagram();
        buf.push(0xff);
        assert!(matches!(decode(&buf), Err(DecodeError::LengthMismatch { .. })));
    }

    #[test]
    fn rejects_too_many_flows() {
        let mut buf = HEADER.to_vec();
        let count = NF5_MAXFLOWS + 1;
        buf[2..4].copy_from_slice(&count.to_be_bytes());
        buf.extend(std::iter::repeat(0u8).take(RECORD_SIZE * count as usize));
        assert!(matches!(decode(&buf), Err(DecodeError::TooManyFlows { .. })));
    }
}
