use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use super::client::ClientConfig;
use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::metrics::MetricsConfig;
use super::proxy::ProxyConfig;
use super::server::ServerConfig;

const LOCAL_CONFIG_PATH: &str = "doqd.toml";
const SYSTEM_CONFIG_PATH: &str = "/etc/doqd/config.toml";

/// Main configuration structure for doqd
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// DoQ server (listeners, TLS material, backend)
    #[serde(default)]
    pub server: ServerConfig,

    /// DoQ client used by `proxy` and `query`
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. doqd.toml in current directory
    /// 3. /etc/doqd/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if let Some(found) = Self::get_config_path() {
            Self::from_file(&found)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if !overrides.listen.is_empty() {
            self.server.listen = overrides.listen;
        }
        if let Some(backend) = overrides.backend {
            self.server.backend = backend;
        }
        if let Some(cert) = overrides.tls_cert {
            self.server.tls_cert = cert;
        }
        if let Some(key) = overrides.tls_key {
            self.server.tls_key = key;
        }
        if overrides.compat {
            self.server.compat = true;
            self.client.compat = true;
        }
        if let Some(server) = overrides.server {
            self.client.server = server;
        }
        if let Some(name) = overrides.server_name {
            self.client.server_name = Some(name);
        }
        if overrides.insecure {
            self.client.insecure_skip_verify = true;
        }
        if let Some(listen) = overrides.proxy_listen {
            self.proxy.listen = listen;
        }
        if let Some(listen) = overrides.metrics_listen {
            self.metrics.listen = Some(listen);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen.is_empty() {
            return Err(ConfigError::Validation(
                "No listen addresses configured".to_string(),
            ));
        }

        for addr in &self.server.listen {
            parse_socket_addr("server.listen", addr)?;
        }
        parse_socket_addr("server.backend", &self.server.backend)?;
        parse_socket_addr("proxy.listen", &self.proxy.listen)?;

        if let Some(addr) = &self.metrics.listen {
            parse_socket_addr("metrics.listen", addr)?;
        }

        if self.server.idle_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "server.idle_timeout_secs cannot be 0".to_string(),
            ));
        }
        if self.server.backend_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "server.backend_timeout_secs cannot be 0".to_string(),
            ));
        }
        if self.server.max_concurrent_streams == 0 {
            return Err(ConfigError::Validation(
                "server.max_concurrent_streams cannot be 0".to_string(),
            ));
        }
        if self.server.max_in_flight_queries == Some(0) {
            return Err(ConfigError::Validation(
                "server.max_in_flight_queries cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the path to the configuration file being used
    pub fn get_config_path() -> Option<String> {
        if std::path::Path::new(LOCAL_CONFIG_PATH).exists() {
            Some(LOCAL_CONFIG_PATH.to_string())
        } else if std::path::Path::new(SYSTEM_CONFIG_PATH).exists() {
            Some(SYSTEM_CONFIG_PATH.to_string())
        } else {
            None
        }
    }
}

fn parse_socket_addr(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::Validation(format!("{} '{}' is invalid: {}", field, value, e)))
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub listen: Vec<String>,
    pub backend: Option<String>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub compat: bool,
    pub server: Option<String>,
    pub server_name: Option<String>,
    pub insecure: bool,
    pub proxy_listen: Option<String>,
    pub metrics_listen: Option<String>,
    pub log_level: Option<String>,
}
