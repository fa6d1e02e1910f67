//! Plain UDP DNS in front, DoQ behind.
//!
//! Every datagram is forwarded on its own task over one shared client
//! connection. A connection found dead is replaced once and the query retried.

use super::client::{DoqClient, DoqClientSettings};
use doqd_domain::protocol::MAX_STREAM_MESSAGE_SIZE;
use doqd_domain::DomainError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct DoqProxy {
    socket: UdpSocket,
    settings: DoqClientSettings,
    client: Mutex<Arc<DoqClient>>,
}

impl DoqProxy {
    pub async fn bind(listen: SocketAddr, settings: DoqClientSettings) -> Result<Self, DomainError> {
        let client = DoqClient::connect(&settings).await?;
        let socket = UdpSocket::bind(listen)
            .await
            .map_err(|e| DomainError::ListenFailed {
                addr: listen.to_string(),
                reason: e.to_string(),
            })?;

        info!(
            listen = %listen,
            server = %client.server_addr(),
            "DoQ proxy listening"
        );

        Ok(Self {
            socket,
            settings,
            client: Mutex::new(Arc::new(client)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DomainError> {
        self.socket
            .local_addr()
            .map_err(|e| DomainError::ListenFailed {
                addr: "proxy".to_string(),
                reason: e.to_string(),
            })
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut buf = vec![0u8; MAX_STREAM_MESSAGE_SIZE];
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => {
                    let (len, peer) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            warn!(error = %e, "Proxy receive failed");
                            continue;
                        }
                    };
                    let query = buf[..len].to_vec();
                    let proxy = Arc::clone(&self);
                    tasks.spawn(async move { proxy.answer(query, peer).await });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Proxy task failed");
                    }
                }
            }
        }

        tasks.shutdown().await;
        let client = Arc::clone(&*self.client.lock().await);
        client.close().await;
        debug!("DoQ proxy stopped");
    }

    async fn answer(&self, query: Vec<u8>, peer: SocketAddr) {
        match self.forward(&query).await {
            Ok(response) => {
                if let Err(e) = self.socket.send_to(&response, peer).await {
                    warn!(peer = %peer, error = %e, "Failed to send proxied answer");
                }
            }
            Err(e) => debug!(peer = %peer, error = %e, "Proxied query failed"),
        }
    }

    /// Forwards one raw query, reconnecting once if the shared connection is gone.
    pub async fn forward(&self, query: &[u8]) -> Result<Vec<u8>, DomainError> {
        let client = Arc::clone(&*self.client.lock().await);
        match client.send_raw(query).await {
            Err(e) if client.is_closed() => {
                warn!(error = %e, "DoQ connection lost, reconnecting");
                let client = self.reconnect(&client).await?;
                client.send_raw(query).await
            }
            result => result,
        }
    }

    async fn reconnect(&self, failed: &Arc<DoqClient>) -> Result<Arc<DoqClient>, DomainError> {
        let mut current = self.client.lock().await;
        // Another task may already have replaced it.
        if Arc::ptr_eq(&current, failed) {
            *current = Arc::new(DoqClient::connect(&self.settings).await?);
        }
        Ok(Arc::clone(&current))
    }
}
