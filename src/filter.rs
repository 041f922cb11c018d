//! Filter engine (§4.C): ordered match/action rules, first-match-wins.

use std::fmt;
use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::store::{bits, Flow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub lo: u16,
    pub hi: u16,
}

impl PortRange {
    pub fn contains(&self, port: u16) -> bool {
        (self.lo..=self.hi).contains(&port)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.lo == self.hi {
            write!(f, "{}", self.lo)
        } else {
            write!(f, "{}-{}", self.lo, self.hi)
        }
    }
}

/// A mask+value pair, used for TCP flags and TOS matching: a flow's byte
/// matches iff `(byte & mask) == value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskValue {
    pub mask: u8,
    pub value: u8,
}

impl MaskValue {
    pub fn matches(&self, byte: u8) -> bool {
        byte & self.mask == self.value
    }
}

/// Every predicate is optional; an absent predicate matches unconditionally.
/// All present predicates must match for the rule to fire (§4.C).
#[derive(Debug, Clone, Default)]
pub struct Match {
    pub src_cidr: Option<IpNetwork>,
    pub dst_cidr: Option<IpNetwork>,
    pub agent_cidr: Option<IpNetwork>,
    pub proto: Option<u8>,
    pub src_port: Option<PortRange>,
    pub dst_port: Option<PortRange>,
    pub tcp_flags: Option<MaskValue>,
    pub tos: Option<MaskValue>,
    pub if_in: Option<u16>,
    pub if_out: Option<u16>,
}

impl Match {
    pub fn matches(&self, flow: &Flow) -> bool {
        cidr_matches(self.src_cidr, flow.src_addr.to_ip_addr())
            && cidr_matches(self.dst_cidr, flow.dst_addr.to_ip_addr())
            && cidr_matches(self.agent_cidr, flow.agent_addr.to_ip_addr())
            && self.proto.map_or(true, |p| flow.proto == p)
            && self.src_port.map_or(true, |r| r.contains(flow.src_port))
            && self.dst_port.map_or(true, |r| r.contains(flow.dst_port))
            && self.tcp_flags.map_or(true, |mv| mv.matches(flow.tcp_flags))
            && self.tos.map_or(true, |mv| mv.matches(flow.tos))
            && self.if_in.map_or(true, |i| flow.if_in == i)
            && self.if_out.map_or(true, |i| flow.if_out == i)
    }
}

fn cidr_matches(cidr: Option<IpNetwork>, addr: Option<IpAddr>) -> bool {
    match (cidr, addr) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(net), Some(ip)) => net.contains(ip),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Accept,
    Discard,
    AcceptWithTag(u32),
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: Option<String>,
    pub m: Match,
    pub action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Discard,
}

/// An ordered rule set; evaluation is linear and stops at the first match
/// (§4.C). No rule matching falls through to `Accept` with the flow
/// unmodified.
#[derive(Debug, Clone, Default)]
pub struct FilterList {
    rules: Vec<Rule>,
}

impl FilterList {
    pub fn new(rules: Vec<Rule>) -> Self {
        FilterList { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluates `flow` against every rule in order; `AcceptWithTag` mutates
    /// the flow's tag and sets the `TAG` bit before returning.
    pub fn evaluate(&self, flow: &mut Flow) -> Verdict {
        for rule in &self.rules {
            if !rule.m.matches(flow) {
                continue;
            }
            return match rule.action {
                Action::Accept => Verdict::Accept,
                Action::Discard => Verdict::Discard,
                Action::AcceptWithTag(tag) => {
                    flow.tag = tag;
                    flow.set(bits::TAG);
                    Verdict::Accept
                }
            };
        }
        Verdict::Accept
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}: ", name)?;
        }
        write!(f, "{:?} -> {:?}", self.m, self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Addr;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn flow_with_ports(src: u16, dst: u16) -> Flow {
        let mut f = Flow::new();
        f.src_port = src;
        f.dst_port = dst;
        f.set_src_addr(Addr::from_v4([10, 0, 0, 1].into()));
        f.set_dst_addr(Addr::from_v4([192, 168, 1, 1].into()));
        f
    }

    #[test]
    fn first_match_wins() {
        let rules = vec![
            Rule {
                name: Some("allow-dns".into()),
                m: Match {
                    dst_port: Some(PortRange { lo: 53, hi: 53 }),
                    ..Default::default()
                },
                action: Action::Accept,
            },
            Rule {
                name: Some("discard-all".into()),
                m: Match::default(),
                action: Action::Discard,
            },
        ];
        let list = FilterList::new(rules);

        let mut dns = flow_with_ports(5000, 53);
        assert_eq!(list.evaluate(&mut dns), Verdict::Accept);

        let mut other = flow_with_ports(5000, 8080);
        assert_eq!(list.evaluate(&mut other), Verdict::Discard);
    }

    #[test]
    fn no_match_defaults_to_accept() {
        let list = FilterList::new(vec![]);
        let mut flow = flow_with_ports(1, 2);
        assert_eq!(list.evaluate(&mut flow), Verdict::Accept);
    }

    #[test]
    fn accept_with_tag_mutates_flow() {
        let rules = vec![Rule {
            name: None,
            m: Match::default(),
            action: Action::AcceptWithTag(42),
        }];
        let list = FilterList::new(rules);
        let mut flow = flow_with_ports(1, 2);
        assert_eq!(list.evaluate(&mut flow), Verdict::Accept);
        assert_eq!(flow.tag, 42);
        assert!(flow.has(bits::TAG));
    }

    #[test]
    fn cidr_predicate_respects_prefix() {
        let rules = vec![Rule {
            name: None,
            m: Match {
                src_cidr: Some(IpNetwork::from_str("10.0.0.0/8").unwrap()),
                ..Default::default()
            },
            action: Action::Discard,
        }];
        let list = FilterList::new(rules);
        let mut flow = flow_with_ports(1, 2);
        assert_eq!(list.evaluate(&mut flow), Verdict::Discard);
    }

    fn discard_rule(dst_port: u16) -> Rule {
        Rule {
            name: None,
            m: Match { dst_port: Some(PortRange { lo: dst_port, hi: dst_port }), ..Default::default() },
            action: Action::Discard,
        }
    }

    proptest::proptest! {
        /// Invariant 5 (§8): `evaluate` is a pure function of `(rules, flow)`.
        #[test]
        fn prop_evaluate_is_deterministic(src in any::<u16>(), dst in any::<u16>(), n_rules in 0usize..8) {
            let rules: Vec<Rule> = (0..n_rules as u16).map(discard_rule).collect();
            let list = FilterList::new(rules);

            let mut a = flow_with_ports(src, dst);
            let mut b = flow_with_ports(src, dst);
            let verdict_a = list.evaluate(&mut a);
            let verdict_b = list.evaluate(&mut b);

            proptest::prop_assert_eq!(verdict_a, verdict_b);
            proptest::prop_assert_eq!(a.tag, b.tag);
        }

        /// Invariant 6 (§8): inserting a rule before an existing matching
        /// rule never produces a verdict other than what the first matching
        /// rule (old or new) decides.
        #[test]
        fn prop_first_match_wins(dst in any::<u16>(), inserted_action_discard in any::<bool>()) {
            let tail = vec![Rule {
                name: None,
                m: Match::default(),
                action: Action::Accept,
            }];
            let mut with_head = vec![Rule {
                name: None,
                m: Match { dst_port: Some(PortRange { lo: dst, hi: dst }), ..Default::default() },
                action: if inserted_action_discard { Action::Discard } else { Action::Accept },
            }];
            with_head.extend(tail.clone());

            let list = FilterList::new(with_head);
            let mut flow = flow_with_ports(1, dst);
            let verdict = list.evaluate(&mut flow);

            let expected = if inserted_action_discard { Verdict::Discard } else { Verdict::Accept };
            proptest::prop_assert_eq!(verdict, expected);
        }
    }
}
