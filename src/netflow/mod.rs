//! Multi-version NetFlow wire decoder (§4.E).

pub mod v1;
pub mod v5;
pub mod v7;
pub mod v9;

use crate::addr::Addr;
use crate::error::DecodeError;
use crate::store::{bits, Flow};

/// Per-datagram record count ceilings. The wire header's count field is
/// 16 bits wide but a single UDP datagram can realistically only carry a
/// few dozen fixed-width records; these mirror the original source's
/// `NF{1,5,7}_MAXFLOWS` bounds.
pub const NF1_MAXFLOWS: u16 = 30;
pub const NF5_MAXFLOWS: u16 = 30;
pub const NF7_MAXFLOWS: u16 = 30;

/// Common 2-byte version prologue shared by v1/v5/v7/v9 (§4.E). Every
/// decoder peeks this before picking its own header layout.
pub fn peek_version(buf: &[u8]) -> Result<u16, DecodeError> {
    if buf.len() < 2 {
        return Err(DecodeError::ShortPacket { expected: 2, got: buf.len() });
    }
    Ok(u16::from_be_bytes([buf[0], buf[1]]))
}

/// Decodes the fixed-layout versions (v1/v5/v7); v9 is dispatched
/// separately by the collector since it needs a peer's template cache
/// (`v9::TemplateSource`), not just the datagram bytes.
pub fn decode_fixed(buf: &[u8], version: u16) -> Result<Vec<Flow>, DecodeError> {
    match version {
        1 => v1::decode(buf),
        5 => v5::decode(buf),
        7 => v7::decode(buf),
        other => Err(DecodeError::UnsupportedVersion(other)),
    }
}

/// Stamps the fields every decoder leaves to its caller (§4.E "after
/// decoding, stamp recv_secs... set agent_addr... set netflow_version").
pub fn stamp_common(flows: &mut [Flow], agent_addr: Addr, now_secs: u32, version: u16) {
    for flow in flows {
        flow.recv_secs = now_secs;
        flow.set_agent_addr(agent_addr);
        flow.netflow_version = version;
        flow.set(bits::RECV_TIME);
        flow.set(bits::AGENT_INFO);
    }
}

pub(crate) fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

pub(crate) fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes(buf[off..off + 4].try_into().unwrap())
}
