//! NetFlow v9: the template-driven case (§4.E).

pub mod data;
pub mod fields;
pub mod template;

use crate::error::DecodeError;
use crate::store::Flow;

pub use template::{Tmpl, TmplField};

use super::{read_u16, read_u32};

pub const HEADER_SIZE: usize = 20;
const TEMPLATE_FLOWSET_ID: u16 = 0;
const OPTIONS_FLOWSET_ID: u16 = 1;
const MIN_RECORD_FLOWSET_ID: u16 = 256;

#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub version: u16,
    pub count: u16,
    pub uptime_ms: u32,
    pub time_sec: u32,
    pub package_sequence: u32,
    pub source_id: u32,
}

impl Header {
    fn read(buf: &[u8]) -> Self {
        Header {
            version: read_u16(buf, 0),
            count: read_u16(buf, 2),
            uptime_ms: read_u32(buf, 4),
            time_sec: read_u32(buf, 8),
            package_sequence: read_u32(buf, 12),
            source_id: read_u32(buf, 16),
        }
    }
}

/// Per-peer template cache access, abstracting over the peer registry so
/// this module doesn't need to know about peer admission (§4.D owns that).
pub trait TemplateSource {
    fn find(&mut self, source_id: u32, template_id: u16) -> Option<Tmpl>;
    fn upsert(&mut self, source_id: u32, template_id: u16, fields: Vec<TmplField>);
    fn note_no_template(&mut self);
}

/// Parses a v9 datagram's flowsets in order, dispatching template (id 0),
/// options (id 1), reserved (2-255, logged and skipped), and data (≥256)
/// flowsets. Returns every flow decoded from data flowsets this datagram.
pub fn decode<T: TemplateSource>(buf: &[u8], max_template_len: usize, store: &mut T) -> Result<Vec<Flow>, DecodeError> {
    if buf.len() < HEADER_SIZE {
        return Err(DecodeError::ShortPacket { expected: HEADER_SIZE, got: buf.len() });
    }
    let header = Header::read(buf);

    let mut flows = Vec::new();
    let mut offset = HEADER_SIZE;

    loop {
        if offset >= buf.len() {
            return Err(DecodeError::ShortPacket { expected: offset + 4, got: buf.len() });
        }
        if offset + 4 > buf.len() {
            return Err(DecodeError::ShortPacket { expected: offset + 4, got: buf.len() });
        }
        let flowset_id = read_u16(buf, offset);
        let flowset_len = read_u16(buf, offset + 2) as usize;

        if offset + flowset_len > buf.len() {
            return Err(DecodeError::FlowsetOverrun);
        }
        if flowset_len < 4 {
            return Err(DecodeError::FlowsetOverrun);
        }
        let body = &buf[offset + 4..offset + flowset_len];

        match flowset_id {
            TEMPLATE_FLOWSET_ID => {
                let templates = template::parse_template_flowset(body, max_template_len)?;
                for (template_id, fields) in templates {
                    store.upsert(header.source_id, template_id, fields);
                }
            }
            OPTIONS_FLOWSET_ID => {
                log::debug!("netflow v.9 options flowset from source {}", header.source_id);
            }
            id if id < MIN_RECORD_FLOWSET_ID => {
                log::warn!("received unknown netflow v.9 reserved flowset type {}", id);
            }
            id => match store.find(header.source_id, id) {
                Some(tmpl) => {
                    let mut decoded = data::decode_data_flowset(body, &tmpl)?;
                    for flow in &mut decoded {
                        flow.sys_uptime_ms = header.uptime_ms;
                        flow.time_sec = header.time_sec;
                        flow.flow_sequence = header.package_sequence;
                        flow.set(crate::store::bits::AGENT_INFO);
                    }
                    flows.extend(decoded);
                }
                None => store.note_no_template(),
            },
        }

        offset += flowset_len;
        if offset == buf.len() {
            break;
        }
    }

    Ok(flows)
}
