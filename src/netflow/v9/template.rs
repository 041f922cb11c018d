//! Template flowset (id 0) parsing and the `Tmpl` cache record (§3, §4.E).

use crate::error::DecodeError;

use super::fields::check_rec_len;
use super::{read_u16, read_u32};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TmplField {
    pub field_type: u16,
    pub len: u16,
}

/// A decoded v9 template. Field order is semantically significant: data
/// records are a concatenation of values in exactly this order (§3).
#[derive(Debug, Clone)]
pub struct Tmpl {
    pub source_id: u32,
    pub template_id: u16,
    pub fields: Vec<TmplField>,
    pub total_len: u32,
    pub last_used_seq: u32,
}

impl Tmpl {
    pub fn new(source_id: u32, template_id: u16, fields: Vec<TmplField>) -> Self {
        let total_len = fields.iter().map(|f| f.len as u32).sum();
        Tmpl { source_id, template_id, fields, total_len, last_used_seq: 0 }
    }
}

/// Parses every template record in a template flowset's body (the bytes
/// after the `flowset_id`/`length` common header), returning
/// `(template_id, fields)` pairs in arrival order. `max_template_len`
/// bounds the running summed length per template (§4.E).
pub fn parse_template_flowset(body: &[u8], max_template_len: usize) -> Result<Vec<(u16, Vec<TmplField>)>, DecodeError> {
    let mut templates = Vec::new();
    let mut offset = 0usize;

    while offset + 4 <= body.len() {
        let template_id = read_u16(body, offset);
        let field_count = read_u16(body, offset + 2);
        offset += 4;

        if field_count == 0 {
            return Err(DecodeError::EmptyTemplate);
        }

        let mut fields = Vec::with_capacity(field_count as usize);
        let mut total: usize = 0;
        for _ in 0..field_count {
            if offset + 4 > body.len() {
                return Err(DecodeError::ShortPacket { expected: offset + 4, got: body.len() });
            }
            let field_type = read_u16(body, offset);
            let len = read_u16(body, offset + 2);
            offset += 4;

            if len == 0 {
                return Err(DecodeError::BadFieldLength(len));
            }
            total += len as usize;
            if total > max_template_len {
                return Err(DecodeError::TemplateTooLong { total, max: max_template_len });
            }
            if !check_rec_len(field_type, len) {
                return Err(DecodeError::BadFieldLength(len));
            }

            fields.push(TmplField { field_type, len });
        }

        templates.push((template_id, fields));
    }

    Ok(templates)
}

/// Parses the v9 header fields needed for data-flowset bookkeeping, reused
/// by `super::mod`'s top-level decode.
pub(crate) fn source_id(header: &[u8]) -> u32 {
    read_u32(header, 16)
}
