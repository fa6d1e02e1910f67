pub mod client;
pub mod proxy;
pub mod server;
pub mod stream;
pub mod tls;

pub use client::{DoqClient, DoqClientSettings};
pub use proxy::DoqProxy;
pub use server::{DoqServer, DoqServerSettings};
pub use tls::TlsIdentity;

use doqd_domain::DoqErrorCode;
use quinn::VarInt;

pub(crate) fn error_code_varint(code: DoqErrorCode) -> VarInt {
    VarInt::from_u32(code.as_u32())
}

/// Identifier agreed on during the handshake, if any.
pub fn negotiated_protocol(connection: &quinn::Connection) -> Option<String> {
    connection
        .handshake_data()
        .and_then(|data| data.downcast::<quinn::crypto::rustls::HandshakeData>().ok())
        .and_then(|data| data.protocol)
        .map(|protocol| String::from_utf8_lossy(&protocol).into_owned())
}

/// True for the ways a connection ends without anything to report.
pub(crate) fn is_orderly_close(error: &quinn::ConnectionError) -> bool {
    use quinn::ConnectionError::*;
    matches!(
        error,
        ApplicationClosed(_) | ConnectionClosed(_) | TimedOut | LocallyClosed | Reset
    )
}
