use serde::{Deserialize, Serialize};

use crate::protocol::{DEFAULT_IDLE_TIMEOUT, ProtocolIdentifiers};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// One DoQ listener is bound per address.
    #[serde(default = "default_listen")]
    pub listen: Vec<String>,

    /// Plain UDP DNS server answering the relayed queries.
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default = "default_tls_cert")]
    pub tls_cert: String,

    #[serde(default = "default_tls_key")]
    pub tls_key: String,

    /// Advertise the legacy identifiers next to the current draft.
    #[serde(default)]
    pub compat: bool,

    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Streams a single connection may have open at once.
    #[serde(default = "default_max_concurrent_streams")]
    pub max_concurrent_streams: u32,

    /// Process-wide cap on queries being relayed. Unlimited when unset.
    #[serde(default)]
    pub max_in_flight_queries: Option<usize>,

    #[serde(default = "default_backend_timeout_secs")]
    pub backend_timeout_secs: u64,
}

impl ServerConfig {
    pub fn identifiers(&self) -> ProtocolIdentifiers {
        ProtocolIdentifiers::for_compat_flag(self.compat)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            backend: default_backend(),
            tls_cert: default_tls_cert(),
            tls_key: default_tls_key(),
            compat: false,
            idle_timeout_secs: default_idle_timeout_secs(),
            max_concurrent_streams: default_max_concurrent_streams(),
            max_in_flight_queries: None,
            backend_timeout_secs: default_backend_timeout_secs(),
        }
    }
}

fn default_listen() -> Vec<String> {
    vec!["[::1]:784".to_string()]
}

fn default_backend() -> String {
    "[::1]:53".to_string()
}

fn default_tls_cert() -> String {
    "cert.pem".to_string()
}

fn default_tls_key() -> String {
    "key.pem".to_string()
}

fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT.as_secs()
}

fn default_max_concurrent_streams() -> u32 {
    100
}

fn default_backend_timeout_secs() -> u64 {
    5
}
