use thiserror::Error;

/// Errors from the address & value codec (§4.A).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddrError {
    #[error("invalid address text: {0}")]
    BadAddress(String),
}

/// Errors from the persistent flow store codec (§4.B).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("short read: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("bad magic: {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported store version: {0}")]
    UnsupportedVersion(u32),
    #[error("header mismatch with existing logfile")]
    HeaderMismatch,
    #[error("unknown field bit {0} cannot be skipped")]
    UnknownField(u32),
    #[error("CRC-32 mismatch")]
    CrcError,
    #[error("write failed: {0}")]
    WriteError(String),
    #[error("src/dst address family mismatch")]
    AfMismatch,
}

/// Errors from the NetFlow wire decoder (§4.E). Every one of these is a
/// tier-1, per-datagram failure (§7) — callers count it against the peer
/// and move on, never propagate it as fatal.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("short packet: expected at least {expected} bytes, got {got}")]
    ShortPacket { expected: usize, got: usize },
    #[error("datagram length {len} does not match header+flow-count layout")]
    LengthMismatch { len: usize },
    #[error("flow count {0} is zero")]
    ZeroCount(usize),
    #[error("flow count {got} exceeds MAX_FLOWS_VERSION ({max})")]
    TooManyFlows { got: usize, max: usize },
    #[error("unsupported netflow version {0}")]
    UnsupportedVersion(u16),
    #[error("template field count is zero")]
    EmptyTemplate,
    #[error("template field length {0} is invalid")]
    BadFieldLength(u16),
    #[error("template total length {total} exceeds max_template_len ({max})")]
    TemplateTooLong { total: usize, max: usize },
    #[error("data flowset record count {0} is unreasonable")]
    UnreasonableRecordCount(usize),
    #[error("flowset length runs past datagram end")]
    FlowsetOverrun,
}

/// Errors from loading external configuration (§6). The grammar itself is
/// out of scope; this only covers wiring the `config` crate's merge/convert.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("invalid macro definition: {0}")]
    BadMacro(String),
    #[error("invalid CIDR in filter rule: {0}")]
    BadCidr(String),
}
