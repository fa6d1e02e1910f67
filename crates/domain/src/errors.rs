use crate::protocol::DoqErrorCode;
use thiserror::Error;

/// How far a failure reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// Abort the offending stream; the connection keeps serving other queries.
    Stream,
    /// Close the whole connection.
    Connection,
}

#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("Failed to listen on {addr}: {reason}")]
    ListenFailed { addr: String, reason: String },

    #[error("Invalid TLS material: {0}")]
    TlsConfig(String),

    #[error("Failed to connect to DoQ server {server}: {reason}")]
    ConnectFailed { server: String, reason: String },

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Failed to open QUIC stream: {0}")]
    StreamOpen(String),

    #[error("QUIC stream read failed: {0}")]
    StreamRead(String),

    #[error("QUIC stream write failed: {0}")]
    StreamWrite(String),

    #[error("QUIC stream reset by peer with code {code}")]
    StreamReset { code: DoqErrorCode },

    #[error("Short write: wrote {written} of {expected} bytes")]
    ShortWrite { expected: usize, written: usize },

    #[error("DNS query too small: {len} bytes (minimum {min})")]
    UndersizedQuery { len: usize, min: usize },

    #[error("Malformed DNS query: {0}")]
    MalformedQuery(String),

    #[error("Prohibited EDNS option {0} on a DoQ connection")]
    ProhibitedEdnsOption(u16),

    #[error("Backend {backend} unreachable: {reason}")]
    BackendUnreachable { backend: String, reason: String },

    #[error("Backend {backend} write failed: {reason}")]
    BackendWriteFailed { backend: String, reason: String },

    #[error("Backend {backend} read failed: {reason}")]
    BackendReadFailed { backend: String, reason: String },

    #[error("Backend {backend} timed out")]
    BackendTimeout { backend: String },

    #[error("Malformed DNS response: {0}")]
    MalformedResponse(String),

    #[error("Failed to encode DNS message: {0}")]
    Encode(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DomainError {
    /// Only protocol violations the wire protocol makes fatal and transport
    /// loss reach the connection. Backend and codec failures fail one query.
    pub fn scope(&self) -> FailureScope {
        match self {
            Self::ProhibitedEdnsOption(_) | Self::ConnectionLost(_) => FailureScope::Connection,
            _ => FailureScope::Stream,
        }
    }

    /// Close code sent to the peer for this failure.
    pub fn error_code(&self) -> DoqErrorCode {
        DoqErrorCode::InternalError
    }

    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::BackendUnreachable { .. }
                | Self::BackendWriteFailed { .. }
                | Self::BackendReadFailed { .. }
                | Self::BackendTimeout { .. }
        )
    }
}
