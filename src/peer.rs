//! Peer registry (§4.D): per-exporter liveness state and the v9 template
//! cache, both modeled as bounded LRUs (Design Note 1).

use std::collections::HashSet;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use log::info;

use crate::netflow::v9::{Tmpl, TmplField};

/// Grace window during which an LRU-chosen peer is protected from eviction
/// if it has been active recently (§4.D `find_or_admit`).
const ACTIVE_GRACE: Duration = Duration::from_secs(60);

type TemplateKey = (u32, u16);
type GlobalTemplateKey = (SocketAddr, TemplateKey);

pub struct Peer {
    pub remote_addr: SocketAddr,
    pub first_seen: Instant,
    pub last_seen: Instant,
    pub n_packets: u64,
    pub n_flows: u64,
    pub n_invalid: u64,
    pub n_no_template: u64,
    pub n_af_mismatch: u64,
    pub n_filtered: u64,
    pub last_version: u16,
    pub n_templates: usize,
}

impl Peer {
    fn new(remote_addr: SocketAddr, now: Instant) -> Self {
        Peer {
            remote_addr,
            first_seen: now,
            last_seen: now,
            n_packets: 0,
            n_flows: 0,
            n_invalid: 0,
            n_no_template: 0,
            n_af_mismatch: 0,
            n_filtered: 0,
            last_version: 0,
            n_templates: 0,
        }
    }
}

pub enum Admit<'a> {
    Peer(&'a mut Peer),
    Rejected,
}

/// Admission + template bookkeeping for every exporter talking to this
/// collector. `max_peers`/`max_templates`/`max_sources`/`max_template_len`
/// come from config (§3).
///
/// Templates live in a single cache keyed by `(peer address, (source_id,
/// template_id))` rather than one `LruCache` per peer: `max_templates` is a
/// bound *global across all peers* (§3), so recency has to be tracked
/// across peers too — a per-peer cache can only ever evict its own
/// entries, which can't enforce a shared ceiling (Design Note 1).
pub struct Peers {
    order: LruCache<SocketAddr, Peer>,
    templates: LruCache<GlobalTemplateKey, Tmpl>,
    max_templates: usize,
    max_sources: usize,
}

impl Peers {
    pub fn new(max_peers: usize, max_templates: usize, max_sources: usize) -> Self {
        Peers {
            order: LruCache::new(NonZeroUsize::new(max_peers.max(1)).unwrap()),
            templates: LruCache::unbounded(),
            max_templates,
            max_sources,
        }
    }

    /// §4.D: move existing peers to MRU; admit new ones under capacity;
    /// otherwise evict the LRU peer unless it was active within the last
    /// 60s, in which case admission is refused.
    pub fn find_or_admit(&mut self, addr: SocketAddr, now: Instant) -> Admit<'_> {
        if self.order.contains(&addr) {
            self.order.promote(&addr);
            return Admit::Peer(self.order.get_mut(&addr).unwrap());
        }

        if self.order.len() < self.order.cap().get() {
            self.order.put(addr, Peer::new(addr, now));
            return Admit::Peer(self.order.get_mut(&addr).unwrap());
        }

        if let Some((_, lru_peer)) = self.order.peek_lru() {
            if now.duration_since(lru_peer.last_seen) < ACTIVE_GRACE {
                return Admit::Rejected;
            }
        }

        if let Some((evicted_addr, _)) = self.order.pop_lru() {
            self.drop_templates_for(&evicted_addr);
        }
        self.order.put(addr, Peer::new(addr, now));
        Admit::Peer(self.order.get_mut(&addr).unwrap())
    }

    pub fn update(&mut self, addr: &SocketAddr, n_flows: u64, version: u16, now: Instant) {
        if let Some(peer) = self.order.get_mut(addr) {
            peer.n_packets += 1;
            peer.n_flows += n_flows;
            peer.last_version = version;
            peer.last_seen = now;
        }
    }

    pub fn template_find(&mut self, addr: &SocketAddr, source_id: u32, template_id: u16) -> Option<&Tmpl> {
        self.templates.get(&(*addr, (source_id, template_id)))
    }

    /// Every distinct `source_id` currently cached for `addr`, used to
    /// enforce the per-peer `max_sources` bound.
    fn distinct_sources(&self, addr: &SocketAddr) -> HashSet<u32> {
        self.templates
            .iter()
            .filter(|((a, _), _)| a == addr)
            .map(|((_, (source_id, _)), _)| *source_id)
            .collect()
    }

    /// The least-recently-used template key belonging to `addr`, found by
    /// walking the global cache's MRU-to-LRU order and keeping the last
    /// match — the global LRU position of a template doesn't tell us
    /// anything about its position within one peer's own subset.
    fn peer_lru_key(&self, addr: &SocketAddr) -> Option<GlobalTemplateKey> {
        self.templates.iter().filter(|(k, _)| &k.0 == addr).last().map(|(k, _)| *k)
    }

    fn drop_templates_for(&mut self, addr: &SocketAddr) {
        let keys: Vec<GlobalTemplateKey> = self.templates.iter().filter(|(k, _)| &k.0 == addr).map(|(k, _)| *k).collect();
        for key in keys {
            self.templates.pop(&key);
        }
    }

    fn decrement_owner(&mut self, owner: &SocketAddr) {
        if let Some(peer) = self.order.peek_mut(owner) {
            peer.n_templates = peer.n_templates.saturating_sub(1);
        }
    }

    /// Replaces any prior template for `(source_id, template_id)` atomically,
    /// enforcing the global template bound (checked first) and the
    /// per-peer distinct-source bound (§3, Design Note 1). The global bound
    /// evicts the least-recently-used template across *every* peer, not
    /// just the inserting one, so one peer's burst of templates can't starve
    /// another's.
    pub fn template_upsert(
        &mut self,
        addr: &SocketAddr,
        source_id: u32,
        template_id: u16,
        fields: Vec<TmplField>,
    ) -> bool {
        if !self.order.contains(addr) {
            return false;
        }

        let key = (*addr, (source_id, template_id));
        let replacing = self.templates.contains(&key);

        if !replacing {
            if self.templates.len() >= self.max_templates {
                if let Some((evicted_key, _)) = self.templates.pop_lru() {
                    self.decrement_owner(&evicted_key.0);
                }
            }
            if self.distinct_sources(addr).len() >= self.max_sources
                && !self.templates.iter().any(|((a, (s, _)), _)| a == addr && *s == source_id)
            {
                if let Some(victim) = self.peer_lru_key(addr) {
                    self.templates.pop(&victim);
                    self.decrement_owner(addr);
                }
            }
        }

        self.templates.put(key, Tmpl::new(source_id, template_id, fields));
        if !replacing {
            if let Some(peer) = self.order.peek_mut(addr) {
                peer.n_templates += 1;
            }
        }
        true
    }

    /// Drops peers whose address is no longer permitted by the current
    /// config's allow-list (§4.D reconfiguration path).
    pub fn scrub<F: Fn(&SocketAddr) -> bool>(&mut self, still_allowed: F) {
        let stale: Vec<SocketAddr> = self
            .order
            .iter()
            .filter(|(addr, _)| !still_allowed(addr))
            .map(|(addr, _)| *addr)
            .collect();
        for addr in stale {
            self.order.pop(&addr);
            self.drop_templates_for(&addr);
        }
    }

    pub fn dump(&self) {
        for (addr, peer) in self.order.iter() {
            info!(
                "peer {}: packets={} flows={} invalid={} no_template={} af_mismatch={} filtered={} templates={} last_version={}",
                addr,
                peer.n_packets,
                peer.n_flows,
                peer.n_invalid,
                peer.n_no_template,
                peer.n_af_mismatch,
                peer.n_filtered,
                peer.n_templates,
                peer.last_version
            );
        }
    }

    pub fn note_no_template(&mut self, addr: &SocketAddr) {
        if let Some(peer) = self.order.get_mut(addr) {
            peer.n_no_template += 1;
        }
    }

    /// §7 tier 1: any malformed-datagram rejection bumps the peer's
    /// `n_invalid` counter.
    pub fn note_invalid(&mut self, addr: &SocketAddr) {
        if let Some(peer) = self.order.get_mut(addr) {
            peer.n_invalid += 1;
        }
    }

    /// §7 tier 2: a flow dropped for mismatched src/dst address families is
    /// silently dropped but still counted.
    pub fn note_af_mismatch(&mut self, addr: &SocketAddr) {
        if let Some(peer) = self.order.get_mut(addr) {
            peer.n_af_mismatch += 1;
        }
    }

    /// §7 tier 2: a flow discarded by the filter engine is silently dropped
    /// but still counted.
    pub fn note_filtered(&mut self, addr: &SocketAddr) {
        if let Some(peer) = self.order.get_mut(addr) {
            peer.n_filtered += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Borrows this registry for one peer's duration through the v9
    /// decoder's `TemplateSource` seam.
    pub fn for_peer<'a>(&'a mut self, addr: SocketAddr) -> PeerTemplateCtx<'a> {
        PeerTemplateCtx { peers: self, addr }
    }
}

/// Adapts `Peers` to `netflow::v9::TemplateSource` for one peer address, so
/// the decoder can look up/insert templates without knowing about peer
/// admission (§4.D owns that).
pub struct PeerTemplateCtx<'a> {
    peers: &'a mut Peers,
    addr: SocketAddr,
}

impl<'a> crate::netflow::v9::TemplateSource for PeerTemplateCtx<'a> {
    fn find(&mut self, source_id: u32, template_id: u16) -> Option<Tmpl> {
        self.peers.template_find(&self.addr, source_id, template_id).cloned()
    }

    fn upsert(&mut self, source_id: u32, template_id: u16, fields: Vec<TmplField>) {
        self.peers.template_upsert(&self.addr, source_id, template_id, fields);
    }

    fn note_no_template(&mut self) {
        self.peers.note_no_template(&self.addr);
    }
}
