use crate::{bootstrap, di, server};
use doqd_domain::Config;
use doqd_infrastructure::doq::TlsIdentity;
use doqd_infrastructure::metrics::DoqMetrics;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(config: Config) -> anyhow::Result<()> {
    let identity = TlsIdentity::from_pem_files(&config.server.tls_cert, &config.server.tls_key)?;
    info!(
        cert = %config.server.tls_cert,
        chain_len = identity.certs().len(),
        "TLS identity loaded"
    );

    let metrics = DoqMetrics::new()?;
    let use_case = di::build_relay_use_case(&config.server, Arc::new(metrics.clone()))?;

    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let servers =
        server::spawn_doq_servers(&config.server, &identity, use_case, &shutdown, &mut tasks)?;

    if let Some(listen) = &config.metrics.listen {
        let listen: SocketAddr = listen.parse()?;
        let token = shutdown.clone();
        let metrics = metrics.clone();
        tasks.spawn(async move {
            if let Err(e) = server::start_metrics_server(listen, metrics, token).await {
                error!(error = %e, "Metrics endpoint failed");
            }
        });
    }

    info!(
        listeners = servers.len(),
        backend = %config.server.backend,
        "doqd server running"
    );

    bootstrap::shutdown_signal().await;

    info!("Shutting down");
    shutdown.cancel();
    while tasks.join_next().await.is_some() {}

    for server in &servers {
        server.close();
        if tokio::time::timeout(DRAIN_TIMEOUT, server.wait_idle())
            .await
            .is_err()
        {
            warn!("Timed out waiting for DoQ connections to drain");
        }
    }

    info!(
        queries = metrics.queries(),
        valid_queries = metrics.valid_queries(),
        upstream_errors = metrics.upstream_errors(),
        "doqd server stopped"
    );
    Ok(())
}
