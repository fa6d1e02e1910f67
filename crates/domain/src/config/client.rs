use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolIdentifiers;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_server")]
    pub server: String,

    /// TLS server name. Falls back to the host part of `server`.
    #[serde(default)]
    pub server_name: Option<String>,

    /// Accept any server certificate (self-signed test deployments).
    #[serde(default)]
    pub insecure_skip_verify: bool,

    #[serde(default)]
    pub compat: bool,
}

impl ClientConfig {
    pub fn identifiers(&self) -> ProtocolIdentifiers {
        ProtocolIdentifiers::for_compat_flag(self.compat)
    }

    /// Name presented in the TLS handshake.
    pub fn effective_server_name(&self) -> String {
        if let Some(name) = &self.server_name {
            return name.clone();
        }
        host_part(&self.server)
            .filter(|host| !host.is_empty())
            .unwrap_or("localhost")
            .to_string()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            server_name: None,
            insecure_skip_verify: false,
            compat: false,
        }
    }
}

fn host_part(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        return rest.split(']').next();
    }
    addr.rsplit_once(':').map(|(host, _)| host)
}

fn default_server() -> String {
    "[::1]:784".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_name_from_hostname() {
        let cfg = ClientConfig {
            server: "dns.example.net:784".to_string(),
            ..Default::default()
        };
        assert_eq!(cfg.effective_server_name(), "dns.example.net");
    }

    #[test]
    fn test_server_name_from_ipv6_literal() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.effective_server_name(), "::1");
    }

    #[test]
    fn test_explicit_server_name_wins() {
        let cfg = ClientConfig {
            server: "127.0.0.1:784".to_string(),
            server_name: Some("localhost".to_string()),
            ..Default::default()
        };
        assert_eq!(cfg.effective_server_name(), "localhost");
    }
}
