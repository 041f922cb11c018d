//! Collector loop (§4.F, §5): a single `tokio` current-thread task polling
//! every listener socket, a control channel standing in for the monitor
//! RPC, and the `INT/TERM/HUP/USR1/USR2` signal set with `tokio::select!`.
//! No additional OS threads — the Rust-idiomatic equivalent of the
//! original's single-threaded `poll(2)` loop.

use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use log::{error, info, warn};
use tokio::net::UdpSocket;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::addr::Addr;
use crate::filter::{FilterList, Verdict};
use crate::netflow::{self, v9};
use crate::peer::{Admit, Peers};
use crate::ratelimit::RateLimiter;
use crate::settings::Config;
use crate::store::{self, Flow};

/// §4.F: "Receive one datagram (bounded 2 KiB buffer)", matching the
/// original source's fixed-size `buf[2048]`.
const MAX_DATAGRAM: usize = 2048;

/// Abstracts the persistent log file so the collector doesn't own
/// privsep/daemonization (§4.F); `main` hands one in at startup standing in
/// for the monitor process, and it's reopened on `USR1`/`HUP`.
pub trait LogWriter {
    fn write_flow(&mut self, flow: &Flow, mask: u32) -> Result<(), crate::error::StoreError>;
    fn reopen(&mut self) -> io::Result<()>;
}

/// A `LogWriter` backed by a single append-only file, using
/// `store::open_for_append`'s new-vs-existing header contract.
pub struct FileLogWriter {
    path: std::path::PathBuf,
    file: std::fs::File,
}

impl FileLogWriter {
    pub fn open(path: impl Into<std::path::PathBuf>, start_time: u32) -> io::Result<Self> {
        let path = path.into();
        let mut file = std::fs::OpenOptions::new().create(true).read(true).append(true).open(&path)?;
        store::open_for_append(&mut file, start_time)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        Ok(FileLogWriter { path, file })
    }
}

impl LogWriter for FileLogWriter {
    fn write_flow(&mut self, flow: &Flow, mask: u32) -> Result<(), crate::error::StoreError> {
        store::put_flow(&mut self.file, flow, mask)?;
        Ok(())
    }

    fn reopen(&mut self) -> io::Result<()> {
        let now = crate::time::unix_now();
        self.file = std::fs::OpenOptions::new().create(true).read(true).append(true).open(&self.path)?;
        store::open_for_append(&mut self.file, now).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        Ok(())
    }
}

/// One bound listener socket.
struct Listener {
    addr: SocketAddr,
    sock: UdpSocket,
}

/// Per-peer, per-source-id v9 template state lives in `Peers`; everything
/// else the loop needs lives here.
pub struct Collector {
    config: Config,
    config_path: Option<std::path::PathBuf>,
    macros: Vec<(String, String)>,
    listeners: Vec<Listener>,
    peers: Peers,
    filters: FilterList,
    log: Box<dyn LogWriter>,
    ratelimit: RateLimiter<(SocketAddr, &'static str)>,
}

impl Collector {
    pub async fn bind(
        config: Config,
        config_path: Option<std::path::PathBuf>,
        macros: Vec<(String, String)>,
        log: Box<dyn LogWriter>,
    ) -> io::Result<Self> {
        let mut listeners = Vec::with_capacity(config.listen_addrs.len());
        for addr in &config.listen_addrs {
            let sock = UdpSocket::bind(addr).await?;
            listeners.push(Listener { addr: *addr, sock });
        }
        let peers = Peers::new(config.max_peers, config.max_templates, config.max_sources);
        let filters = FilterList::new(config.filter_list.clone());
        Ok(Collector {
            config,
            config_path,
            macros,
            listeners,
            peers,
            filters,
            log,
            ratelimit: RateLimiter::new(1024, 5, 1),
        })
    }

    /// Runs until `INT`/`TERM`, reconfiguring on `HUP`, reopening the log on
    /// `USR1`/`HUP`, and dumping peer/rule state on `USR2` (§4.F, §6).
    pub async fn run(mut self, mut reconfigure: mpsc::Receiver<Config>) -> io::Result<()> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sighup = signal(SignalKind::hangup())?;
        let mut sigusr1 = signal(SignalKind::user_defined1())?;
        let mut sigusr2 = signal(SignalKind::user_defined2())?;

        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            let recv = recv_any(&self.listeners, &mut buf);
            tokio::select! {
                result = recv => {
                    let (n, peer_addr, listener_idx) = result?;
                    self.handle_datagram(&buf[..n], peer_addr, listener_idx);
                }
                Some(new_config) = reconfigure.recv() => {
                    self.reconfigure(new_config);
                }
                _ = sigint.recv() => {
                    info!("received SIGINT, exiting");
                    return Ok(());
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, exiting");
                    return Ok(());
                }
                _ = sighup.recv() => {
                    info!("received SIGHUP, reconfiguring and reopening log");
                    match Config::load(self.config_path.as_deref(), &self.macros) {
                        Ok(new_config) => self.reconfigure(new_config),
                        Err(e) => error!("SIGHUP config reload failed, keeping current config: {}", e),
                    }
                    self.log.reopen()?;
                }
                _ = sigusr1.recv() => {
                    info!("received SIGUSR1, reopening log");
                    self.log.reopen()?;
                }
                _ = sigusr2.recv() => {
                    self.dump();
                }
            }
        }
    }

    fn reconfigure(&mut self, new_config: Config) {
        info!("reconfiguring");
        self.filters = FilterList::new(new_config.filter_list.clone());
        let allow_list = new_config.allow_list.clone();
        self.peers.scrub(|addr| match &allow_list {
            None => true,
            Some(list) => list.iter().any(|net| net.contains(addr.ip())),
        });
        self.config = new_config;
    }

    fn dump(&self) {
        info!("-- peer dump (SIGUSR2) --");
        self.peers.dump();
        info!("-- filter rules --");
        for rule in self.filters.rules() {
            info!("{}", rule);
        }
    }

    fn handle_datagram(&mut self, datagram: &[u8], peer_addr: SocketAddr, _listener_idx: usize) {
        let now_instant = Instant::now();

        if !self.config.admits(&peer_addr.ip()) {
            return;
        }

        let peer = match self.peers.find_or_admit(peer_addr, now_instant) {
            Admit::Peer(p) => p,
            Admit::Rejected => {
                if self.ratelimit.allow((peer_addr, "peer-table-full"), now_instant) {
                    warn!("peer table full, rejecting datagram from {}", peer_addr);
                }
                return;
            }
        };
        let _ = peer;

        let version = match netflow::peek_version(datagram) {
            Ok(v) => v,
            Err(e) => {
                self.warn_tier1(peer_addr, now_instant, "bad-version", &e.to_string());
                self.peers.note_invalid(&peer_addr);
                return;
            }
        };

        let now_secs = crate::time::unix_now();
        let agent_addr = Addr::from(peer_addr);

        let decoded = if version == 9 {
            let mut ctx = self.peers.for_peer(peer_addr);
            v9::decode(datagram, self.config.max_template_len, &mut ctx)
        } else {
            netflow::decode_fixed(datagram, version)
        };

        let mut flows = match decoded {
            Ok(flows) => flows,
            Err(e) => {
                self.warn_tier1(peer_addr, now_instant, "decode-error", &e.to_string());
                self.peers.update(&peer_addr, 0, version, now_instant);
                self.peers.note_invalid(&peer_addr);
                return;
            }
        };

        netflow::stamp_common(&mut flows, agent_addr, now_secs, version);
        self.peers.update(&peer_addr, flows.len() as u64, version, now_instant);

        let mut accepted = 0u64;
        for mut flow in flows {
            if !flow.addresses_consistent() {
                warn!("flow from {} has mismatched src/dst address families, dropping", peer_addr);
                self.peers.note_af_mismatch(&peer_addr);
                continue;
            }
            if self.filters.evaluate(&mut flow) == Verdict::Discard {
                self.peers.note_filtered(&peer_addr);
                continue;
            }
            if let Err(e) = self.log.write_flow(&flow, self.config.store_mask) {
                error!("store write failed: {}", e);
                std::process::exit(1);
            }
            accepted += 1;
        }
        let _ = accepted;
    }

    fn warn_tier1(&mut self, peer_addr: SocketAddr, now: Instant, reason: &'static str, detail: &str) {
        if self.ratelimit.allow((peer_addr, reason), now) {
            warn!("{} from {}: {}", reason, peer_addr, detail);
        }
    }
}

/// Polls every listener's socket in round order and returns the first one
/// ready, tagged with which listener it came from — the `tokio` analog of
/// `poll(2)` over a set of file descriptors whose count isn't known at
/// compile time, so a fixed-arity `tokio::select!` can't express it.
async fn recv_any(listeners: &[Listener], buf: &mut [u8]) -> io::Result<(usize, SocketAddr, usize)> {
    std::future::poll_fn(|cx| {
        for (idx, l) in listeners.iter().enumerate() {
            let mut read_buf = tokio::io::ReadBuf::new(buf);
            match l.sock.poll_recv_from(cx, &mut read_buf) {
                std::task::Poll::Ready(Ok(addr)) => {
                    let n = read_buf.filled().len();
                    return std::task::Poll::Ready(Ok((n, addr, idx)));
                }
                std::task::Poll::Ready(Err(e)) => return std::task::Poll::Ready(Err(e)),
                std::task::Poll::Pending => continue,
            }
        }
        std::task::Poll::Pending
    })
    .await
}

impl Listener {
    #[allow(dead_code)]
    fn addr(&self) -> SocketAddr {
        self.addr
    }
}
