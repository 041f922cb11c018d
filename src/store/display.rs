//! Text rendering for the `netflow-reader` companion tool (§6 CLI
//! (reader)): a brief one-line summary (`DISPLAY_BRIEF`) and a verbose
//! field-by-field dump (`DISPLAY_ALL`), mirroring the original reader's
//! brief-vs-`-v` output without duplicating field knowledge in the binary
//! itself.

use super::flow::{bits, Flow};

/// One line per flow, the reader's default (non-`-v`) output.
pub fn brief_line(flow: &Flow) -> String {
    format!(
        "{} {}:{} > {}:{} proto={} tos={:#04x} flags={:#04x} packets={} octets={} tag={}",
        flow.recv_secs,
        flow.src_addr,
        flow.src_port,
        flow.dst_addr,
        flow.dst_port,
        flow.proto,
        flow.tos,
        flow.tcp_flags,
        flow.packets,
        flow.octets,
        flow.tag,
    )
}

/// Every present field, one `name=value` pair per line, the reader's `-v`
/// output.
pub fn verbose_lines(flow: &Flow) -> Vec<String> {
    let mut out = Vec::new();
    let present = |bit| flow.has(bit);

    if present(bits::TAG) {
        out.push(format!("tag={}", flow.tag));
    }
    if present(bits::RECV_TIME) {
        out.push(format!("recv_secs={}", flow.recv_secs));
    }
    if present(bits::PROTO_FLAGS_TOS) {
        out.push(format!(
            "proto={} tos={:#04x} tcp_flags={:#04x}",
            flow.proto, flow.tos, flow.tcp_flags
        ));
    }
    if present(bits::AGENT_ADDR) {
        out.push(format!("agent_addr={}", flow.agent_addr));
    }
    if present(bits::SRC_ADDR) {
        out.push(format!("src_addr={}", flow.src_addr));
    }
    if present(bits::DST_ADDR) {
        out.push(format!("dst_addr={}", flow.dst_addr));
    }
    if present(bits::GATEWAY_ADDR) {
        out.push(format!("gateway_addr={}", flow.gateway_addr));
    }
    if present(bits::SRCDST_PORT) {
        out.push(format!("src_port={} dst_port={}", flow.src_port, flow.dst_port));
    }
    if present(bits::PACKETS) {
        out.push(format!("packets={}", flow.packets));
    }
    if present(bits::OCTETS) {
        out.push(format!("octets={}", flow.octets));
    }
    if present(bits::IF_INDICES) {
        out.push(format!("if_in={} if_out={}", flow.if_in, flow.if_out));
    }
    if present(bits::AGENT_INFO) {
        out.push(format!(
            "sys_uptime_ms={} time_sec={} time_nanosec={} netflow_version={}",
            flow.sys_uptime_ms, flow.time_sec, flow.time_nanosec, flow.netflow_version
        ));
    }
    if present(bits::FLOW_TIMES) {
        out.push(format!("flow_start={} flow_finish={}", flow.flow_start, flow.flow_finish));
    }
    if present(bits::AS_INFO) {
        out.push(format!(
            "src_as={} dst_as={} src_mask={} dst_mask={}",
            flow.src_as, flow.dst_as, flow.src_mask, flow.dst_mask
        ));
    }
    if present(bits::FLOW_ENGINE_INFO) {
        out.push(format!(
            "engine_type={} engine_id={} flow_sequence={}",
            flow.engine_type, flow.engine_id, flow.flow_sequence
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Addr;

    #[test]
    fn brief_line_reads_back_obvious_fields() {
        let mut flow = Flow::new();
        flow.set_src_addr(Addr::from_v4([10, 0, 0, 1].into()));
        flow.set_dst_addr(Addr::from_v4([10, 0, 0, 2].into()));
        flow.src_port = 1234;
        flow.dst_port = 80;
        let line = brief_line(&flow);
        assert!(line.contains("10.0.0.1:1234"));
        assert!(line.contains("10.0.0.2:80"));
    }

    #[test]
    fn verbose_lines_only_include_present_fields() {
        let mut flow = Flow::new();
        flow.packets = 10;
        flow.set(bits::PACKETS);
        let lines = verbose_lines(&flow);
        assert!(lines.iter().any(|l| l.starts_with("packets=10")));
        assert!(!lines.iter().any(|l| l.starts_with("octets=")));
    }
}
