pub mod doq;
pub mod metrics;

pub use doq::spawn_doq_servers;
pub use metrics::start_metrics_server;
