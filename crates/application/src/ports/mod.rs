mod backend_relay;
mod query_codec;
mod query_metrics;

pub use backend_relay::BackendRelay;
pub use query_codec::QueryCodec;
pub use query_metrics::{NoopMetrics, QueryMetricsSink};

// Re-export for convenience
pub use doqd_domain::DoqQuery;
