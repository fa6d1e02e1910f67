use crate::di;
use doqd_application::use_cases::RelayQueryUseCase;
use doqd_domain::config::ServerConfig;
use doqd_infrastructure::doq::{DoqServer, TlsIdentity};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Binds one DoQ server per configured listen address and spawns its
/// accept loop onto `tasks`. Any bind failure aborts startup.
pub fn spawn_doq_servers(
    config: &ServerConfig,
    identity: &TlsIdentity,
    use_case: Arc<RelayQueryUseCase>,
    shutdown: &CancellationToken,
    tasks: &mut JoinSet<()>,
) -> anyhow::Result<Vec<Arc<DoqServer>>> {
    let mut servers = Vec::with_capacity(config.listen.len());

    for listen in &config.listen {
        let listen: SocketAddr = listen.parse()?;
        let settings = di::server_settings(config, listen);
        let server = Arc::new(DoqServer::bind(&settings, identity, Arc::clone(&use_case))?);

        let accept_loop = Arc::clone(&server);
        let token = shutdown.clone();
        tasks.spawn(async move { accept_loop.run(token).await });

        servers.push(server);
    }

    Ok(servers)
}
