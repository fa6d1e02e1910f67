use async_trait::async_trait;
use doqd_application::ports::{BackendRelay, QueryMetricsSink};
use doqd_application::use_cases::RelayQueryUseCase;
use doqd_domain::protocol::EDNS_TCP_KEEPALIVE;
use doqd_domain::{DomainError, ProtocolIdentifiers};
use doqd_infrastructure::dns::codec::{append_opt_record, build_query};
use doqd_infrastructure::dns::HickoryQueryCodec;
use doqd_infrastructure::doq::tls::client_crypto;
use doqd_infrastructure::doq::{DoqClientSettings, DoqServer, DoqServerSettings, TlsIdentity};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Self-signed identity for `localhost`, loaded through the PEM path.
pub fn test_identity() -> TlsIdentity {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    TlsIdentity::from_pem(
        certified.cert.pem().as_bytes(),
        certified.key_pair.serialize_pem().as_bytes(),
    )
    .unwrap()
}

pub fn client_settings(addr: SocketAddr, identifiers: ProtocolIdentifiers) -> DoqClientSettings {
    let mut settings = DoqClientSettings::new(addr.to_string(), "localhost");
    settings.identifiers = identifiers;
    settings.insecure_skip_verify = true;
    settings
}

/// An A query carrying the edns-tcp-keepalive option.
pub fn query_with_keepalive(name: &str) -> Vec<u8> {
    let mut wire = build_query(name, "A", true, false).unwrap();
    append_opt_record(&mut wire, 1232, false, &[(EDNS_TCP_KEEPALIVE, &[0x00, 0x64])]).unwrap();
    wire
}

/// A peer that opens a stream, writes a partial query and never finishes it.
/// The endpoint and connection are returned so the stream stays alive.
pub async fn open_unfinished_stream(
    addr: SocketAddr,
) -> (quinn::Endpoint, quinn::Connection, quinn::SendStream) {
    let mut endpoint = quinn::Endpoint::client("127.0.0.1:0".parse().unwrap()).unwrap();
    let crypto = client_crypto(&ProtocolIdentifiers::strict(), true).unwrap();
    endpoint.set_default_client_config(quinn::ClientConfig::new(crypto));

    let connection = endpoint.connect(addr, "localhost").unwrap().await.unwrap();
    let (mut send, _recv) = connection.open_bi().await.unwrap();
    send.write_all(&[0x00, 0x01]).await.unwrap();

    (endpoint, connection, send)
}

/// A DoQ server on an ephemeral loopback port, running until dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    server: Arc<DoqServer>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start(
        identifiers: ProtocolIdentifiers,
        relay: Arc<dyn BackendRelay>,
        metrics: Arc<dyn QueryMetricsSink>,
    ) -> Self {
        Self::start_with(
            DoqServerSettings::new("127.0.0.1:0".parse().unwrap(), identifiers),
            relay,
            metrics,
        )
        .await
    }

    pub async fn start_with(
        settings: DoqServerSettings,
        relay: Arc<dyn BackendRelay>,
        metrics: Arc<dyn QueryMetricsSink>,
    ) -> Self {
        let use_case = Arc::new(RelayQueryUseCase::new(
            Arc::new(HickoryQueryCodec::new()),
            relay,
            metrics,
        ));
        let server = Arc::new(DoqServer::bind(&settings, &test_identity(), use_case).unwrap());
        let addr = server.local_addr().unwrap();
        let shutdown = CancellationToken::new();

        let handle = {
            let server = Arc::clone(&server);
            let token = shutdown.clone();
            tokio::spawn(async move { server.run(token).await })
        };

        Self {
            addr,
            shutdown,
            server,
            handle: Some(handle),
        }
    }

    /// Cancels the accept loop and waits for every session to finish.
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        self.server.wait_idle().await;
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Fails the first `failures` exchanges with a timeout, then delegates.
pub struct FlakyRelay<R> {
    inner: R,
    remaining_failures: AtomicUsize,
}

impl<R> FlakyRelay<R> {
    pub fn new(inner: R, failures: usize) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl<R: BackendRelay> BackendRelay for FlakyRelay<R> {
    async fn exchange(&self, query: &[u8]) -> Result<Vec<u8>, DomainError> {
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DomainError::BackendTimeout {
                backend: self.inner.backend_name(),
            });
        }
        self.inner.exchange(query).await
    }

    fn backend_name(&self) -> String {
        self.inner.backend_name()
    }
}
