pub mod client;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod proxy;
pub mod root;
pub mod server;

pub use client::ClientConfig;
pub use errors::ConfigError;
pub use logging::LoggingConfig;
pub use metrics::MetricsConfig;
pub use proxy::ProxyConfig;
pub use root::{CliOverrides, Config};
pub use server::ServerConfig;
