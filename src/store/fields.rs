//! Field-mask canonical order table (Design Note 2): a single source of
//! truth for `(bit -> (read_fn, write_fn, width))`, avoiding the open-coded
//! per-field branches of the original C `store_flow_serialise`/
//! `store_flow_deserialise`.

use super::flow::{bits, Flow};
use crate::addr::Addr;

pub(crate) type EncodeFn = fn(&Flow, &mut Vec<u8>);
pub(crate) type DecodeFn = fn(&mut Flow, &[u8]);

pub(crate) struct FieldSpec {
    pub bit: u32,
    pub width: usize,
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

macro_rules! addr_field {
    ($bit:expr, $width:expr, $getter:ident, $setter:ident, $variant:ident) => {
        FieldSpec {
            bit: $bit,
            width: $width,
            encode: |f, buf| buf.extend_from_slice(addr_bytes(&f.$getter)),
            decode: |f, data| {
                let mut raw = [0u8; $width];
                raw.copy_from_slice(data);
                f.$setter(Addr::$variant(raw));
            },
        }
    };
}

fn addr_bytes(addr: &Addr) -> &[u8] {
    match addr {
        Addr::V4(b) => b.as_slice(),
        Addr::V6(b) => b.as_slice(),
        Addr::Empty => &[],
    }
}

/// Ascending-bit table for every field bit *except* `CRC32`/`RESERVED`,
/// which the codec (`super::codec`) handles specially since they frame the
/// rest of the record rather than carry flow data.
pub(crate) const FIELD_TABLE: &[FieldSpec] = &[
    FieldSpec {
        bit: bits::TAG,
        width: 4,
        encode: |f, buf| buf.extend_from_slice(&f.tag.to_be_bytes()),
        decode: |f, data| {
            f.tag = u32::from_be_bytes(data.try_into().unwrap());
            f.set(bits::TAG);
        },
    },
    FieldSpec {
        bit: bits::RECV_TIME,
        width: 4,
        encode: |f, buf| buf.extend_from_slice(&f.recv_secs.to_be_bytes()),
        decode: |f, data| {
            f.recv_secs = u32::from_be_bytes(data.try_into().unwrap());
            f.set(bits::RECV_TIME);
        },
    },
    FieldSpec {
        bit: bits::PROTO_FLAGS_TOS,
        width: 4,
        encode: |f, buf| buf.extend_from_slice(&[f.tcp_flags, f.proto, f.tos, 0]),
        decode: |f, data| {
            f.tcp_flags = data[0];
            f.proto = data[1];
            f.tos = data[2];
            f.set(bits::PROTO_FLAGS_TOS);
        },
    },
    addr_field!(bits::AGENT_ADDR4, 4, agent_addr, set_agent_addr, V4),
    addr_field!(bits::AGENT_ADDR6, 16, agent_addr, set_agent_addr, V6),
    addr_field!(bits::SRC_ADDR4, 4, src_addr, set_src_addr, V4),
    addr_field!(bits::SRC_ADDR6, 16, src_addr, set_src_addr, V6),
    addr_field!(bits::DST_ADDR4, 4, dst_addr, set_dst_addr, V4),
    addr_field!(bits::DST_ADDR6, 16, dst_addr, set_dst_addr, V6),
    addr_field!(bits::GATEWAY_ADDR4, 4, gateway_addr, set_gateway_addr, V4),
    addr_field!(bits::GATEWAY_ADDR6, 16, gateway_addr, set_gateway_addr, V6),
    FieldSpec {
        bit: bits::SRCDST_PORT,
        width: 4,
        encode: |f, buf| {
            buf.extend_from_slice(&f.src_port.to_be_bytes());
            buf.extend_from_slice(&f.dst_port.to_be_bytes());
        },
        decode: |f, data| {
            f.src_port = u16::from_be_bytes(data[0..2].try_into().unwrap());
            f.dst_port = u16::from_be_bytes(data[2..4].try_into().unwrap());
            f.set(bits::SRCDST_PORT);
        },
    },
    FieldSpec {
        bit: bits::PACKETS,
        width: 8,
        encode: |f, buf| buf.extend_from_slice(&f.packets.to_be_bytes()),
        decode: |f, data| {
            f.packets = u64::from_be_bytes(data.try_into().unwrap());
            f.set(bits::PACKETS);
        },
    },
    FieldSpec {
        bit: bits::OCTETS,
        width: 8,
        encode: |f, buf| buf.extend_from_slice(&f.octets.to_be_bytes()),
        decode: |f, data| {
            f.octets = u64::from_be_bytes(data.try_into().unwrap());
            f.set(bits::OCTETS);
        },
    },
    FieldSpec {
        bit: bits::IF_INDICES,
        width: 4,
        encode: |f, buf| {
            buf.extend_from_slice(&f.if_in.to_be_bytes());
            buf.extend_from_slice(&f.if_out.to_be_bytes());
        },
        decode: |f, data| {
            f.if_in = u16::from_be_bytes(data[0..2].try_into().unwrap());
            f.if_out = u16::from_be_bytes(data[2..4].try_into().unwrap());
            f.set(bits::IF_INDICES);
        },
    },
    FieldSpec {
        bit: bits::AGENT_INFO,
        width: 16,
        encode: |f, buf| {
            buf.extend_from_slice(&f.sys_uptime_ms.to_be_bytes());
            buf.extend_from_slice(&f.time_sec.to_be_bytes());
            buf.extend_from_slice(&f.time_nanosec.to_be_bytes());
            buf.extend_from_slice(&f.netflow_version.to_be_bytes());
            buf.extend_from_slice(&[0, 0]);
        },
        decode: |f, data| {
            f.sys_uptime_ms = u32::from_be_bytes(data[0..4].try_into().unwrap());
            f.time_sec = u32::from_be_bytes(data[4..8].try_into().unwrap());
            f.time_nanosec = u32::from_be_bytes(data[8..12].try_into().unwrap());
            f.netflow_version = u16::from_be_bytes(data[12..14].try_into().unwrap());
            f.set(bits::AGENT_INFO);
        },
    },
    FieldSpec {
        bit: bits::FLOW_TIMES,
        width: 8,
        encode: |f, buf| {
            buf.extend_from_slice(&f.flow_start.to_be_bytes());
            buf.extend_from_slice(&f.flow_finish.to_be_bytes());
        },
        decode: |f, data| {
            f.flow_start = u32::from_be_bytes(data[0..4].try_into().unwrap());
            f.flow_finish = u32::from_be_bytes(data[4..8].try_into().unwrap());
            f.set(bits::FLOW_TIMES);
        },
    },
    FieldSpec {
        bit: bits::AS_INFO,
        width: 8,
        encode: |f, buf| {
            buf.extend_from_slice(&f.src_as.to_be_bytes());
            buf.extend_from_slice(&f.dst_as.to_be_bytes());
            buf.extend_from_slice(&[f.src_mask, f.dst_mask, 0, 0]);
        },
        decode: |f, data| {
            f.src_as = u16::from_be_bytes(data[0..2].try_into().unwrap());
            f.dst_as = u16::from_be_bytes(data[2..4].try_into().unwrap());
            f.src_mask = data[4];
            f.dst_mask = data[5];
            f.set(bits::AS_INFO);
        },
    },
    FieldSpec {
        bit: bits::FLOW_ENGINE_INFO,
        width: 8,
        encode: |f, buf| {
            buf.extend_from_slice(&[f.engine_type, f.engine_id, 0, 0]);
            buf.extend_from_slice(&f.flow_sequence.to_be_bytes());
        },
        decode: |f, data| {
            f.engine_type = data[0];
            f.engine_id = data[1];
            f.flow_sequence = u32::from_be_bytes(data[4..8].try_into().unwrap());
            f.set(bits::FLOW_ENGINE_INFO);
        },
    },
];

/// Look up the spec for a bit outside the `CRC32`/`RESERVED` pair, used by
/// both the writer (skip bits not in `allowed_mask`) and the reader (skip
/// bits it doesn't recognize but can still size).
pub(crate) fn spec_for_bit(bit: u32) -> Option<&'static FieldSpec> {
    FIELD_TABLE.iter().find(|s| s.bit == bit)
}
