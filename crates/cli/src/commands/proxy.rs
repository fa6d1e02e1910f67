use crate::{bootstrap, di};
use doqd_domain::Config;
use doqd_infrastructure::doq::DoqProxy;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run(config: Config) -> anyhow::Result<()> {
    let listen: SocketAddr = config.proxy.listen.parse()?;
    let proxy = Arc::new(DoqProxy::bind(listen, di::client_settings(&config.client)).await?);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(Arc::clone(&proxy).run(shutdown.clone()));

    bootstrap::shutdown_signal().await;

    info!("Shutting down proxy");
    shutdown.cancel();
    handle.await?;
    Ok(())
}
