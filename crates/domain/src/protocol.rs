//! DNS-over-QUIC wire constants and identifier negotiation policy.
//!
//! Only implementations of the published RFC may identify as `doq`; draft
//! implementations advertise `doq-iNN`. The compatibility set additionally
//! offers the legacy and experimental identifiers older peers still use.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// Identifier of the draft this implementation speaks.
pub const ALPN_DOQ_I02: &str = "doq-i02";

/// Strict policy: the current draft only.
pub const STRICT_IDENTIFIERS: &[&str] = &[ALPN_DOQ_I02];

/// Compatibility policy, newest first.
pub const COMPAT_IDENTIFIERS: &[&str] = &[ALPN_DOQ_I02, "doq-i01", "doq-i00", "doq", "dq"];

/// 12-byte header plus the smallest possible question (root name, type, class).
pub const MIN_QUERY_SIZE: usize = 17;

/// Receive buffer for a single backend datagram.
pub const BACKEND_READ_BUFFER_SIZE: usize = 4096;

/// Upper bound for a DNS message carried on a stream.
pub const MAX_STREAM_MESSAGE_SIZE: usize = 65_535;

/// edns-tcp-keepalive (RFC 7828). Prohibited on DoQ connections.
pub const EDNS_TCP_KEEPALIVE: u16 = 11;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

pub const DEFAULT_DOQ_PORT: u16 = 784;

/// Appends [`DEFAULT_DOQ_PORT`] to a server address that names no port.
/// Accepts `host`, `host:port`, bare IP literals and bracketed IPv6.
pub fn with_default_port(server: &str) -> String {
    if server.parse::<SocketAddr>().is_ok() {
        return server.to_string();
    }

    let unbracketed = server.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = unbracketed.parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_DOQ_PORT).to_string();
    }

    match server.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => server.to_string(),
        _ => format!("{}:{}", server, DEFAULT_DOQ_PORT),
    }
}

/// Application error code carried by stream resets and connection closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoqErrorCode {
    /// The stream or connection is closed without an error to signal.
    NoError,
    /// The implementation could not pursue the transaction or connection.
    InternalError,
    /// A code received from a peer that this implementation never sends.
    Other(u64),
}

impl DoqErrorCode {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::NoError => 0x00,
            Self::InternalError => 0x01,
            Self::Other(code) => u32::try_from(code).unwrap_or(u32::MAX),
        }
    }

    pub fn from_u64(code: u64) -> Self {
        match code {
            0x00 => Self::NoError,
            0x01 => Self::InternalError,
            other => Self::Other(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoError => "NO_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Other(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for DoqErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "UNKNOWN(0x{:02x})", code),
            _ => write!(f, "{}(0x{:02x})", self.as_str(), self.as_u32()),
        }
    }
}

/// Ordered set of protocol identifiers offered during the TLS handshake.
///
/// Immutable once built; cloning shares the underlying list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolIdentifiers {
    identifiers: Arc<[Arc<str>]>,
}

impl ProtocolIdentifiers {
    pub fn strict() -> Self {
        Self::from_static(STRICT_IDENTIFIERS)
    }

    pub fn compat() -> Self {
        Self::from_static(COMPAT_IDENTIFIERS)
    }

    pub fn for_compat_flag(compat: bool) -> Self {
        if compat {
            Self::compat()
        } else {
            Self::strict()
        }
    }

    /// Builds an arbitrary set. Returns `None` for an empty list or an empty
    /// identifier, neither of which can be negotiated.
    pub fn custom<I, S>(identifiers: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let identifiers: Vec<Arc<str>> = identifiers
            .into_iter()
            .map(|s| Arc::from(s.as_ref()))
            .collect();

        if identifiers.is_empty() || identifiers.iter().any(|id| id.is_empty()) {
            return None;
        }

        Some(Self {
            identifiers: identifiers.into(),
        })
    }

    fn from_static(identifiers: &[&str]) -> Self {
        Self {
            identifiers: identifiers.iter().map(|s| Arc::from(*s)).collect(),
        }
    }

    pub fn as_slice(&self) -> &[Arc<str>] {
        &self.identifiers
    }

    /// Byte form expected by TLS ALPN configuration.
    pub fn alpn_protocols(&self) -> Vec<Vec<u8>> {
        self.identifiers
            .iter()
            .map(|id| id.as_bytes().to_vec())
            .collect()
    }
}

impl fmt::Display for ProtocolIdentifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.identifiers.iter().map(|id| id.as_ref()).collect();
        write!(f, "{}", joined.join(","))
    }
}
