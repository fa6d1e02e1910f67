//! DoQ client engine: one connection, one stream per query.

use super::stream::{map_write_error, read_message};
use super::tls::client_crypto;
use super::{error_code_varint, negotiated_protocol};
use crate::dns::codec::{decode_message, encode_message};
use doqd_domain::protocol::{with_default_port, DEFAULT_IDLE_TIMEOUT};
use doqd_domain::{DomainError, DoqErrorCode, ProtocolIdentifiers};
use hickory_proto::op::Message;
use quinn::{Connection, Endpoint, IdleTimeout};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct DoqClientSettings {
    /// `host:port` of the DoQ server.
    pub server: String,
    /// Name presented in the TLS handshake.
    pub server_name: String,
    pub identifiers: ProtocolIdentifiers,
    pub insecure_skip_verify: bool,
    pub idle_timeout: Duration,
}

impl DoqClientSettings {
    pub fn new(server: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            server_name: server_name.into(),
            identifiers: ProtocolIdentifiers::strict(),
            insecure_skip_verify: false,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

pub struct DoqClient {
    endpoint: Endpoint,
    connection: Connection,
    server: SocketAddr,
}

impl DoqClient {
    /// Resolves the server, offers the configured identifiers and completes
    /// the handshake.
    pub async fn connect(settings: &DoqClientSettings) -> Result<Self, DomainError> {
        let connect_failed = |reason: String| DomainError::ConnectFailed {
            server: settings.server.clone(),
            reason,
        };

        let server = tokio::net::lookup_host(with_default_port(&settings.server))
            .await
            .map_err(|e| connect_failed(e.to_string()))?
            .next()
            .ok_or_else(|| connect_failed("no address resolved".to_string()))?;

        let bind_addr: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let mut endpoint = Endpoint::client(bind_addr).map_err(|e| connect_failed(e.to_string()))?;

        let crypto = client_crypto(&settings.identifiers, settings.insecure_skip_verify)?;
        let idle_timeout = IdleTimeout::try_from(settings.idle_timeout)
            .map_err(|e| DomainError::ConfigError(format!("Invalid idle timeout: {}", e)))?;
        let mut transport = quinn::TransportConfig::default();
        transport.max_idle_timeout(Some(idle_timeout));

        let mut client_config = quinn::ClientConfig::new(crypto);
        client_config.transport_config(Arc::new(transport));
        endpoint.set_default_client_config(client_config);

        let connection = endpoint
            .connect(server, &settings.server_name)
            .map_err(|e| connect_failed(e.to_string()))?
            .await
            .map_err(|e| connect_failed(e.to_string()))?;

        info!(
            server = %server,
            protocol = negotiated_protocol(&connection).as_deref().unwrap_or("none"),
            "Connected to DoQ server"
        );

        Ok(Self {
            endpoint,
            connection,
            server,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    pub fn negotiated_protocol(&self) -> Option<String> {
        negotiated_protocol(&self.connection)
    }

    pub fn is_closed(&self) -> bool {
        self.connection.close_reason().is_some()
    }

    /// Application code the server closed the connection with, if it did.
    pub fn close_code(&self) -> Option<DoqErrorCode> {
        match self.connection.close_reason()? {
            quinn::ConnectionError::ApplicationClosed(close) => {
                Some(DoqErrorCode::from_u64(close.error_code.into_inner()))
            }
            _ => None,
        }
    }

    /// Sends an already encoded query on a fresh stream and returns the raw
    /// answer. A stream reset by the server surfaces as `StreamReset`.
    pub async fn send_raw(&self, query: &[u8]) -> Result<Vec<u8>, DomainError> {
        let (mut send, mut recv) = self.connection.open_bi().await.map_err(|e| {
            if self.is_closed() {
                DomainError::ConnectionLost(e.to_string())
            } else {
                DomainError::StreamOpen(e.to_string())
            }
        })?;

        send.write_all(query).await.map_err(map_write_error)?;
        send.finish()
            .map_err(|e| DomainError::StreamWrite(e.to_string()))?;

        let response = read_message(&mut recv).await?;
        debug!(
            stream = %send.id(),
            query_len = query.len(),
            response_len = response.len(),
            "DoQ exchange complete"
        );
        Ok(response)
    }

    pub async fn send_query(&self, message: &Message) -> Result<Message, DomainError> {
        let query = encode_message(message)?;
        let response = self.send_raw(&query).await?;
        decode_message(&response)
    }

    /// Closes the connection with No-Error and waits for the peer to be told.
    pub async fn close(&self) {
        self.connection
            .close(error_code_varint(DoqErrorCode::NoError), b"");
        self.endpoint.wait_idle().await;
    }
}
