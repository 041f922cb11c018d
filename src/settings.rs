//! Collector/reader configuration (§6). The config-file grammar itself is
//! an external collaborator (parsed by the privileged monitor process in
//! the real system); this module only owns the scalar layer the core
//! consumes directly — listener endpoints, capacity bounds, and the
//! verbose/foreground flags — generalizing the teacher's `config`-crate
//! loading pattern (`settings.rs`/`utils.rs`) to that shape. Filter rules
//! and the peer allow-list are filled in by the external config value and
//! simply carried here.

use std::net::SocketAddr;
use std::path::Path;

use ipnetwork::IpNetwork;

use crate::error::ConfigError;
use crate::filter::Rule;
use crate::store::bits;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigOpts {
    pub foreground: bool,
    pub verbose: bool,
}

/// A loaded, structured configuration (§6). The core never re-reads the
/// config file itself; this is what the monitor hands the collector at
/// startup and again on `HUP` (reconfiguration).
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addrs: Vec<SocketAddr>,
    pub allow_list: Option<Vec<IpNetwork>>,
    pub store_mask: u32,
    pub filter_list: Vec<Rule>,
    pub opts: ConfigOpts,
    pub max_peers: usize,
    pub max_templates: usize,
    pub max_sources: usize,
    pub max_template_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addrs: vec!["0.0.0.0:9995".parse().unwrap()],
            allow_list: None,
            store_mask: bits::ALL,
            filter_list: Vec::new(),
            opts: ConfigOpts::default(),
            max_peers: 1024,
            max_templates: 4096,
            max_sources: 16,
            max_template_len: 1024,
        }
    }
}

impl Config {
    /// Layers defaults, an optional config file, and `-D name=value`
    /// overrides the same way the teacher's `settings::load_config` layers
    /// file and environment sources — `filter_list`/`allow_list` are left
    /// to whatever the caller already parsed from the (out-of-scope) rule
    /// grammar.
    pub fn load(path: Option<&Path>, macros: &[(String, String)]) -> Result<Config, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(p) = path {
            builder = builder.add_source(config::File::from(p));
        }
        builder = builder.add_source(config::Environment::with_prefix("NETFLOWD"));
        for (k, v) in macros {
            builder = builder.set_override(k.as_str(), v.as_str()).map_err(ConfigError::Load)?;
        }
        let raw = builder.build().map_err(ConfigError::Load)?;

        let mut cfg = Config::default();
        if let Ok(addr) = raw.get_string("listen_addr") {
            cfg.listen_addrs = vec![addr
                .parse()
                .map_err(|_| ConfigError::BadMacro(format!("listen_addr={}", addr)))?];
        }
        if let Ok(mask) = raw.get_int("store_mask") {
            cfg.store_mask = mask as u32;
        }
        if let Ok(n) = raw.get_int("max_peers") {
            cfg.max_peers = n as usize;
        }
        if let Ok(n) = raw.get_int("max_templates") {
            cfg.max_templates = n as usize;
        }
        if let Ok(n) = raw.get_int("max_sources") {
            cfg.max_sources = n as usize;
        }
        if let Ok(n) = raw.get_int("max_template_len") {
            cfg.max_template_len = n as usize;
        }
        if let Ok(v) = raw.get_bool("verbose") {
            cfg.opts.verbose = v;
        }
        if let Ok(v) = raw.get_bool("foreground") {
            cfg.opts.foreground = v;
        }

        Ok(cfg)
    }

    /// True if `addr` is admitted by the allow-list, or if there is none
    /// (§4.D "honoring any allow-list from config; if none, accept any
    /// source").
    pub fn admits(&self, addr: &std::net::IpAddr) -> bool {
        match &self.allow_list {
            None => true,
            Some(list) => list.iter().any(|net| net.contains(*addr)),
        }
    }
}

/// Parses a single `name=value` CLI macro definition (`-D name=value`, §6).
pub fn parse_macro(s: &str) -> Result<(String, String), ConfigError> {
    let mut parts = s.splitn(2, '=');
    match (parts.next(), parts.next()) {
        (Some(k), Some(v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(ConfigError::BadMacro(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_permissive() {
        let cfg = Config::default();
        assert!(cfg.admits(&"8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn allow_list_restricts_admission() {
        let mut cfg = Config::default();
        cfg.allow_list = Some(vec!["10.0.0.0/8".parse().unwrap()]);
        assert!(cfg.admits(&"10.1.2.3".parse().unwrap()));
        assert!(!cfg.admits(&"8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn macro_parsing() {
        assert_eq!(
            parse_macro("max_peers=10").unwrap(),
            ("max_peers".to_string(), "10".to_string())
        );
        assert!(parse_macro("no-equals-sign").is_err());
    }
}
