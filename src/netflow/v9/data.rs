//! Data flowset (id ≥ 256) decoding against a previously cached template
//! (§4.E).

use crate::addr::Addr;
use crate::error::DecodeError;
use crate::store::{bits, Flow};

use super::fields::{be_copy_into, NineFieldType};
use super::template::Tmpl;

const MAX_RECORDS: usize = 0x4000;

/// Slices `body` into `⌊body.len() / template.total_len⌋` fixed-width
/// records and walks each against the template's field order, writing
/// right-aligned values into the flow's natural-width slots.
pub fn decode_data_flowset(body: &[u8], template: &Tmpl) -> Result<Vec<Flow>, DecodeError> {
    if template.total_len == 0 {
        return Err(DecodeError::EmptyTemplate);
    }
    let num_records = body.len() / template.total_len as usize;
    if num_records == 0 || num_records > MAX_RECORDS {
        return Err(DecodeError::UnreasonableRecordCount(num_records));
    }
    let remainder = body.len() % template.total_len as usize;
    if remainder != 0 {
        log::debug!(
            "data flowset has {} trailing bytes that don't fill a full record, truncating",
            remainder
        );
    }

    let mut flows = Vec::with_capacity(num_records);
    let mut offset = 0usize;
    for _ in 0..num_records {
        let mut flow = Flow::new();
        let mut field_off = offset;
        for field in &template.fields {
            let len = field.len as usize;
            let data = &body[field_off..field_off + len];
            apply_field(&mut flow, field.field_type, data);
            field_off += len;
        }
        flows.push(flow);
        offset += template.total_len as usize;
    }
    Ok(flows)
}

fn apply_field(flow: &mut Flow, field_type: u16, data: &[u8]) {
    use NineFieldType::*;

    let ty = match num_traits::FromPrimitive::from_u16(field_type) {
        Some(t) => t,
        None => return,
    };

    match ty {
        InBytes => {
            let mut buf = flow.octets.to_be_bytes();
            be_copy_into(&mut buf, data);
            flow.octets = u64::from_be_bytes(buf);
            flow.set(bits::OCTETS);
        }
        InPackets => {
            let mut buf = flow.packets.to_be_bytes();
            be_copy_into(&mut buf, data);
            flow.packets = u64::from_be_bytes(buf);
            flow.set(bits::PACKETS);
        }
        Protocol => {
            flow.proto = data[0];
            flow.set(bits::PROTO_FLAGS_TOS);
        }
        SrcTos => {
            flow.tos = data[0];
            flow.set(bits::PROTO_FLAGS_TOS);
        }
        TcpFlags => {
            flow.tcp_flags = data[0];
            flow.set(bits::PROTO_FLAGS_TOS);
        }
        L4SrcPort => {
            flow.src_port = u16::from_be_bytes(data.try_into().unwrap());
            flow.set(bits::SRCDST_PORT);
        }
        L4DstPort => {
            flow.dst_port = u16::from_be_bytes(data.try_into().unwrap());
            flow.set(bits::SRCDST_PORT);
        }
        Ipv4SrcAddr => flow.set_src_addr(Addr::V4(data.try_into().unwrap())),
        Ipv4DstAddr => flow.set_dst_addr(Addr::V4(data.try_into().unwrap())),
        Ipv4NextHop => flow.set_gateway_addr(Addr::V4(data.try_into().unwrap())),
        Ipv6SrcAddr => flow.set_src_addr(Addr::V6(data.try_into().unwrap())),
        Ipv6DstAddr => flow.set_dst_addr(Addr::V6(data.try_into().unwrap())),
        Ipv6NextHop => flow.set_gateway_addr(Addr::V6(data.try_into().unwrap())),
        SrcMask | Ipv6SrcMask => {
            let mut buf = [flow.src_mask];
            be_copy_into(&mut buf, data);
            flow.src_mask = buf[0];
            flow.set(bits::AS_INFO);
        }
        DstMask | Ipv6DstMask => {
            let mut buf = [flow.dst_mask];
            be_copy_into(&mut buf, data);
            flow.dst_mask = buf[0];
            flow.set(bits::AS_INFO);
        }
        InputSnmp => {
            let mut buf = flow.if_in.to_be_bytes();
            be_copy_into(&mut buf, data);
            flow.if_in = u16::from_be_bytes(buf);
            flow.set(bits::IF_INDICES);
        }
        OutputSnmp => {
            let mut buf = flow.if_out.to_be_bytes();
            be_copy_into(&mut buf, data);
            flow.if_out = u16::from_be_bytes(buf);
            flow.set(bits::IF_INDICES);
        }
        SrcAs => {
            let mut buf = flow.src_as.to_be_bytes();
            be_copy_into(&mut buf, data);
            flow.src_as = u16::from_be_bytes(buf);
            flow.set(bits::AS_INFO);
        }
        DstAs => {
            let mut buf = flow.dst_as.to_be_bytes();
            be_copy_into(&mut buf, data);
            flow.dst_as = u16::from_be_bytes(buf);
            flow.set(bits::AS_INFO);
        }
        FirstSwitched => {
            let mut buf = flow.flow_start.to_be_bytes();
            be_copy_into(&mut buf, data);
            flow.flow_start = u32::from_be_bytes(buf);
            flow.set(bits::FLOW_TIMES);
        }
        LastSwitched => {
            let mut buf = flow.flow_finish.to_be_bytes();
            be_copy_into(&mut buf, data);
            flow.flow_finish = u32::from_be_bytes(buf);
            flow.set(bits::FLOW_TIMES);
        }
        EngineType => {
            flow.engine_type = data[0];
            flow.set(bits::FLOW_ENGINE_INFO);
        }
        EngineId => {
            flow.engine_id = data[0];
            flow.set(bits::FLOW_ENGINE_INFO);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netflow::v9::template::TmplField;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_one_record_against_template() {
        let tmpl = Tmpl::new(
            0,
            256,
            vec![
                TmplField { field_type: 8, len: 4 },
                TmplField { field_type: 12, len: 4 },
                TmplField { field_type: 2, len: 2 },
            ],
        );
        let mut body = Vec::new();
        body.extend_from_slice(&[10, 0, 0, 1]);
        body.extend_from_slice(&[10, 0, 0, 2]);
        body.extend_from_slice(&7u16.to_be_bytes());

        let flows = decode_data_flowset(&body, &tmpl).unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].src_addr, Addr::V4([10, 0, 0, 1]));
        assert_eq!(flows[0].packets, 7);
    }

    #[test]
    fn narrow_field_zero_extends() {
        let tmpl = Tmpl::new(0, 256, vec![TmplField { field_type: 1, len: 2 }]);
        let body = 300u16.to_be_bytes().to_vec();
        let flows = decode_data_flowset(&body, &tmpl).unwrap();
        assert_eq!(flows[0].octets, 300);
    }

    #[test]
    fn zero_records_rejected() {
        let tmpl = Tmpl::new(0, 256, vec![TmplField { field_type: 1, len: 8 }]);
        assert!(matches!(
            decode_data_flowset(&[], &tmpl),
            Err(DecodeError::UnreasonableRecordCount(0))
        ));
    }
}
