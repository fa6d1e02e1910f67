use doqd_application::ports::QueryMetricsSink;
use doqd_application::use_cases::RelayQueryUseCase;
use doqd_domain::config::{ClientConfig, ServerConfig};
use doqd_domain::DomainError;
use doqd_infrastructure::dns::{HickoryQueryCodec, UdpBackendRelay};
use doqd_infrastructure::doq::{DoqClientSettings, DoqServerSettings};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Wires the hickory codec and the UDP backend relay into the use case
/// shared by every listener.
pub fn build_relay_use_case(
    config: &ServerConfig,
    metrics: Arc<dyn QueryMetricsSink>,
) -> Result<Arc<RelayQueryUseCase>, DomainError> {
    let backend: SocketAddr = config.backend.parse().map_err(|e| {
        DomainError::ConfigError(format!("Invalid backend '{}': {}", config.backend, e))
    })?;

    let relay = UdpBackendRelay::new(backend, Duration::from_secs(config.backend_timeout_secs));

    Ok(Arc::new(RelayQueryUseCase::new(
        Arc::new(HickoryQueryCodec::new()),
        Arc::new(relay),
        metrics,
    )))
}

pub fn server_settings(config: &ServerConfig, listen: SocketAddr) -> DoqServerSettings {
    let mut settings = DoqServerSettings::new(listen, config.identifiers());
    settings.idle_timeout = Duration::from_secs(config.idle_timeout_secs);
    settings.max_concurrent_streams = config.max_concurrent_streams;
    settings.max_in_flight_queries = config.max_in_flight_queries;
    settings
}

pub fn client_settings(config: &ClientConfig) -> DoqClientSettings {
    let mut settings =
        DoqClientSettings::new(config.server.clone(), config.effective_server_name());
    settings.identifiers = config.identifiers();
    settings.insecure_skip_verify = config.insecure_skip_verify;
    settings
}
