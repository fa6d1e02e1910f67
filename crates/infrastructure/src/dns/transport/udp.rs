//! UDP relay to the conventional DNS backend (RFC 1035 §4.2.1).
//!
//! Every query gets its own ephemeral socket: one connect, one write, one
//! read. A connected socket only accepts datagrams from the backend, so a
//! response can never be attributed to the wrong query.

use async_trait::async_trait;
use doqd_application::ports::BackendRelay;
use doqd_domain::protocol::BACKEND_READ_BUFFER_SIZE;
use doqd_domain::DomainError;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

pub struct UdpBackendRelay {
    backend: SocketAddr,
    timeout: Duration,
}

impl UdpBackendRelay {
    pub fn new(backend: SocketAddr, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn backend(&self) -> SocketAddr {
        self.backend
    }

    async fn dial(&self) -> Result<UdpSocket, DomainError> {
        let bind_addr: SocketAddr = if self.backend.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| self.unreachable(e))?;
        socket
            .connect(self.backend)
            .await
            .map_err(|e| self.unreachable(e))?;

        Ok(socket)
    }

    fn unreachable(&self, e: std::io::Error) -> DomainError {
        DomainError::BackendUnreachable {
            backend: self.backend.to_string(),
            reason: e.to_string(),
        }
    }

    fn timed_out(&self) -> DomainError {
        DomainError::BackendTimeout {
            backend: self.backend.to_string(),
        }
    }
}

#[async_trait]
impl BackendRelay for UdpBackendRelay {
    async fn exchange(&self, query: &[u8]) -> Result<Vec<u8>, DomainError> {
        let socket = self.dial().await?;

        let bytes_sent = tokio::time::timeout(self.timeout, socket.send(query))
            .await
            .map_err(|_| self.timed_out())?
            .map_err(|e| DomainError::BackendWriteFailed {
                backend: self.backend.to_string(),
                reason: e.to_string(),
            })?;

        if bytes_sent != query.len() {
            return Err(DomainError::BackendWriteFailed {
                backend: self.backend.to_string(),
                reason: format!("sent {} of {} bytes", bytes_sent, query.len()),
            });
        }

        debug!(backend = %self.backend, bytes_sent = bytes_sent, "Query relayed to backend");

        let mut recv_buf = vec![0u8; BACKEND_READ_BUFFER_SIZE];
        let bytes_received = tokio::time::timeout(self.timeout, socket.recv(&mut recv_buf))
            .await
            .map_err(|_| self.timed_out())?
            .map_err(|e| DomainError::BackendReadFailed {
                backend: self.backend.to_string(),
                reason: e.to_string(),
            })?;

        recv_buf.truncate(bytes_received);

        debug!(
            backend = %self.backend,
            bytes_received = bytes_received,
            "Backend response received"
        );

        Ok(recv_buf)
    }

    fn backend_name(&self) -> String {
        self.backend.to_string()
    }
}
