//! NetFlow v7 decoder (§4.E): the Catalyst variant — same shape as v5 plus
//! a trailing 4-byte `router_sc`/flags field the original source never
//! interprets (`XXX: we can parse the (undocumented) flags1 and flags2
//! fields` in the original comment).

use crate::addr::Addr;
use crate::error::DecodeError;
use crate::store::{bits, Flow};

use super::{read_u16, read_u32, NF7_MAXFLOWS};

pub const VERSION: u16 = 7;

pub const HEADER_SIZE: usize = 24;
pub const RECORD_SIZE: usize = 52;

pub fn decode(buf: &[u8]) -> Result<Vec<Flow>, DecodeError> {
    if buf.len() < HEADER_SIZE {
        return Err(DecodeError::ShortPacket { expected: HEADER_SIZE, got: buf.len() });
    }

    let count = read_u16(buf, 2);
    if count == 0 {
        return Err(DecodeError::ZeroCount(0));
    }
    if count > NF7_MAXFLOWS {
        return Err(DecodeError::TooManyFlows { got: count as usize, max: NF7_MAXFLOWS as usize });
    }
    let expected_len = HEADER_SIZE + count as usize * RECORD_SIZE;
    if buf.len() != expected_len {
        return Err(DecodeError::LengthMismatch { len: buf.len() });
    }

    let uptime_ms = read_u32(buf, 4);
    let time_sec = read_u32(buf, 8);
    let time_nanosec = read_u32(buf, 12);
    let flow_sequence = read_u32(buf, 16);

    let mut flows = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let rec = &buf[HEADER_SIZE + i * RECORD_SIZE..HEADER_SIZE + (i + 1) * RECORD_SIZE];
        flows.push(decode_record(rec, uptime_ms, time_sec, time_nanosec, flow_sequence));
    }
    Ok(flows)
}

fn decode_record(rec: &[u8], uptime_ms: u32, time_sec: u32, time_nanosec: u32, flow_sequence: u32) -> Flow {
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

    f.sys_uptime_ms = uptime_ms;
    f.time_sec = time_sec;
    f.time_nanosec = time_nanosec;
    f.set(bits::AGENT_INFO);

    f.flow_sequence = flow_sequence;
    f.set(bits::FLOW_ENGINE_INFO);

    f
}
