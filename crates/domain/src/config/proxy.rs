use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// UDP address accepting plain DNS queries to forward over DoQ.
    #[serde(default = "default_proxy_listen")]
    pub listen: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: default_proxy_listen(),
        }
    }
}

fn default_proxy_listen() -> String {
    "[::1]:5353".to_string()
}
