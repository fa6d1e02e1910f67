/// Counters scraped by the metrics endpoint.
pub trait QueryMetricsSink: Send + Sync {
    fn query_received(&self);

    /// A query passed every conformance check.
    fn query_valid(&self);

    fn backend_error(&self);
}

/// Sink used when metrics are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl QueryMetricsSink for NoopMetrics {
    fn query_received(&self) {}

    fn query_valid(&self) {}

    fn backend_error(&self) {}
}
