//! DoQ server engine.
//!
//! Each accepted connection runs in its own session task. A session accepts
//! streams continuously and reaps their outcomes as they finish, so a slow
//! or failing query never holds up the next one. Only failures scoped to
//! the connection close it.

use super::stream::{abort, finish, read_message, write_message};
use super::tls::{server_crypto, TlsIdentity};
use super::{error_code_varint, is_orderly_close, negotiated_protocol};
use doqd_application::use_cases::RelayQueryUseCase;
use doqd_domain::protocol::DEFAULT_IDLE_TIMEOUT;
use doqd_domain::{DomainError, DoqErrorCode, FailureScope, ProtocolIdentifiers};
use quinn::{Connection, Endpoint, IdleTimeout, Incoming, RecvStream, SendStream, VarInt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DEFAULT_MAX_CONCURRENT_STREAMS: u32 = 100;

#[derive(Debug, Clone)]
pub struct DoqServerSettings {
    pub listen: SocketAddr,
    pub identifiers: ProtocolIdentifiers,
    pub idle_timeout: Duration,
    /// Bidirectional streams a single connection may have open at once.
    pub max_concurrent_streams: u32,
    /// Queries in flight across every connection of this server.
    pub max_in_flight_queries: Option<usize>,
}

impl DoqServerSettings {
    pub fn new(listen: SocketAddr, identifiers: ProtocolIdentifiers) -> Self {
        Self {
            listen,
            identifiers,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
            max_in_flight_queries: None,
        }
    }
}

pub struct DoqServer {
    endpoint: Endpoint,
    identifiers: ProtocolIdentifiers,
    use_case: Arc<RelayQueryUseCase>,
    in_flight: Option<Arc<Semaphore>>,
}

impl DoqServer {
    pub fn bind(
        settings: &DoqServerSettings,
        identity: &TlsIdentity,
        use_case: Arc<RelayQueryUseCase>,
    ) -> Result<Self, DomainError> {
        let crypto = server_crypto(identity, &settings.identifiers)?;

        let idle_timeout = IdleTimeout::try_from(settings.idle_timeout)
            .map_err(|e| DomainError::ConfigError(format!("Invalid idle timeout: {}", e)))?;
        let mut transport = quinn::TransportConfig::default();
        transport
            .max_idle_timeout(Some(idle_timeout))
            .max_concurrent_bidi_streams(VarInt::from_u32(settings.max_concurrent_streams))
            .max_concurrent_uni_streams(VarInt::from_u32(0));

        let mut server_config = quinn::ServerConfig::with_crypto(crypto);
        server_config.transport_config(Arc::new(transport));

        let endpoint = Endpoint::server(server_config, settings.listen).map_err(|e| {
            DomainError::ListenFailed {
                addr: settings.listen.to_string(),
                reason: e.to_string(),
            }
        })?;

        info!(
            listen = %settings.listen,
            identifiers = %settings.identifiers,
            backend = %use_case.backend_name(),
            "DoQ server listening"
        );

        Ok(Self {
            endpoint,
            identifiers: settings.identifiers.clone(),
            use_case,
            in_flight: settings
                .max_in_flight_queries
                .map(|limit| Arc::new(Semaphore::new(limit))),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DomainError> {
        self.endpoint
            .local_addr()
            .map_err(|e| DomainError::ListenFailed {
                addr: "endpoint".to_string(),
                reason: e.to_string(),
            })
    }

    pub fn identifiers(&self) -> &ProtocolIdentifiers {
        &self.identifiers
    }

    /// Accepts connections until `shutdown` fires or the endpoint stops
    /// yielding them, then waits for every session to wind down.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut sessions = JoinSet::new();
        // Cancelled when this loop exits; the caller's token is left alone.
        let sessions_token = shutdown.child_token();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("DoQ accept loop cancelled");
                    break;
                }
                incoming = self.endpoint.accept() => {
                    let Some(incoming) = incoming else {
                        info!("DoQ endpoint closed, accept loop finished");
                        break;
                    };
                    let session = Session {
                        use_case: Arc::clone(&self.use_case),
                        in_flight: self.in_flight.clone(),
                        shutdown: sessions_token.child_token(),
                    };
                    sessions.spawn(session.serve(incoming));
                }
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "DoQ session task failed");
                    }
                }
            }
        }

        sessions_token.cancel();
        while sessions.join_next().await.is_some() {}
    }

    /// Closes every connection with No-Error and stops accepting new ones.
    pub fn close(&self) {
        self.endpoint
            .close(error_code_varint(DoqErrorCode::NoError), b"");
    }

    /// Waits until closing connections have notified their peers.
    pub async fn wait_idle(&self) {
        self.endpoint.wait_idle().await;
    }
}

enum SessionEnd {
    Shutdown,
    PeerClosed(quinn::ConnectionError),
    AcceptFailed(quinn::ConnectionError),
    Fatal(DomainError),
}

struct Session {
    use_case: Arc<RelayQueryUseCase>,
    in_flight: Option<Arc<Semaphore>>,
    shutdown: CancellationToken,
}

impl Session {
    async fn serve(self, incoming: Incoming) {
        let peer = incoming.remote_address();
        let connection = match incoming.await {
            Ok(connection) => connection,
            Err(e) => {
                debug!(peer = %peer, error = %e, "DoQ handshake failed");
                return;
            }
        };

        info!(
            peer = %peer,
            protocol = negotiated_protocol(&connection).as_deref().unwrap_or("none"),
            "DoQ connection established"
        );

        let mut streams = JoinSet::new();
        let end = self.accept_streams(&connection, &mut streams).await;

        match end {
            SessionEnd::Shutdown => {
                connection.close(error_code_varint(DoqErrorCode::NoError), b"");
                debug!(peer = %peer, "DoQ connection closed on shutdown");
            }
            SessionEnd::PeerClosed(reason) => {
                debug!(peer = %peer, reason = %reason, "DoQ connection ended");
            }
            SessionEnd::AcceptFailed(reason) => {
                warn!(peer = %peer, error = %reason, "Failed to accept DoQ stream");
                connection.close(error_code_varint(DoqErrorCode::InternalError), b"");
            }
            SessionEnd::Fatal(e) => {
                warn!(peer = %peer, error = %e, "Closing DoQ connection");
                connection.close(error_code_varint(e.error_code()), b"");
            }
        }

        streams.shutdown().await;
    }

    async fn accept_streams(
        &self,
        connection: &Connection,
        streams: &mut JoinSet<Result<(), DomainError>>,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return SessionEnd::Shutdown,
                accepted = connection.accept_bi() => match accepted {
                    Ok((send, recv)) => {
                        streams.spawn(handle_stream(
                            Arc::clone(&self.use_case),
                            self.in_flight.clone(),
                            send,
                            recv,
                        ));
                    }
                    Err(e) if is_orderly_close(&e) => return SessionEnd::PeerClosed(e),
                    Err(e) => return SessionEnd::AcceptFailed(e),
                },
                Some(joined) = streams.join_next(), if !streams.is_empty() => match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) if e.scope() == FailureScope::Connection => {
                        return SessionEnd::Fatal(e);
                    }
                    Ok(Err(e)) => debug!(error = %e, "DoQ stream failed"),
                    Err(e) => error!(error = %e, "DoQ stream task failed"),
                },
            }
        }
    }
}

/// Drives one stream to completion. On any failure both directions are
/// aborted with the error's code before the error is handed back.
async fn handle_stream(
    use_case: Arc<RelayQueryUseCase>,
    in_flight: Option<Arc<Semaphore>>,
    mut send: SendStream,
    mut recv: RecvStream,
) -> Result<(), DomainError> {
    let result = relay(&use_case, in_flight.as_deref(), &mut send, &mut recv).await;
    if let Err(e) = &result {
        debug!(stream = %send.id(), error = %e, "Aborting DoQ stream");
        abort(&mut send, &mut recv, e.error_code());
    }
    result
}

/// The in-flight permit is held only for the backend round trip.
async fn relay(
    use_case: &RelayQueryUseCase,
    in_flight: Option<&Semaphore>,
    send: &mut SendStream,
    recv: &mut RecvStream,
) -> Result<(), DomainError> {
    let query = read_message(recv).await?;

    let response = {
        let _permit = match in_flight {
            Some(limit) => Some(
                limit
                    .acquire()
                    .await
                    .map_err(|e| DomainError::StreamOpen(e.to_string()))?,
            ),
            None => None,
        };
        use_case.execute(&query).await?
    };

    write_message(send, &response).await?;
    finish(send)
}
