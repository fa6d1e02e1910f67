use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Address of the `/metrics` HTTP endpoint. Disabled when unset.
    #[serde(default)]
    pub listen: Option<String>,
}
