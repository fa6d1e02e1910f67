use doqd_application::ports::QueryMetricsSink;
use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};

/// Process-wide query counters, shared by every listener. Clones share the
/// same registry and counters.
#[derive(Clone)]
pub struct DoqMetrics {
    registry: Registry,
    queries_total: IntCounter,
    valid_queries_total: IntCounter,
    upstream_errors_total: IntCounter,
}

impl DoqMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let counter = IntCounter::with_opts(Opts::new(name, help))?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let queries_total = counter(
            "doqd_queries_total",
            "DNS queries received on DoQ streams",
        )?;
        let valid_queries_total = counter(
            "doqd_valid_queries_total",
            "DNS queries that passed every conformance check",
        )?;
        let upstream_errors_total = counter(
            "doqd_upstream_errors_total",
            "Failed exchanges with the backend resolver",
        )?;

        Ok(Self {
            registry,
            queries_total,
            valid_queries_total,
            upstream_errors_total,
        })
    }

    pub fn queries(&self) -> u64 {
        self.queries_total.get()
    }

    pub fn valid_queries(&self) -> u64 {
        self.valid_queries_total.get()
    }

    pub fn upstream_errors(&self) -> u64 {
        self.upstream_errors_total.get()
    }

    /// Prometheus text exposition of every registered counter.
    pub fn render(&self) -> Result<Vec<u8>, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

impl QueryMetricsSink for DoqMetrics {
    fn query_received(&self) {
        self.queries_total.inc();
    }

    fn query_valid(&self) {
        self.valid_queries_total.inc();
    }

    fn backend_error(&self) {
        self.upstream_errors_total.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = DoqMetrics::new().unwrap();
        assert_eq!(metrics.queries(), 0);
        assert_eq!(metrics.valid_queries(), 0);
        assert_eq!(metrics.upstream_errors(), 0);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = DoqMetrics::new().unwrap();
        let shared = metrics.clone();
        shared.query_received();
        shared.query_received();
        shared.query_valid();
        shared.backend_error();

        assert_eq!(metrics.queries(), 2);
        assert_eq!(metrics.valid_queries(), 1);
        assert_eq!(metrics.upstream_errors(), 1);
    }

    #[test]
    fn test_instances_do_not_share_registries() {
        let first = DoqMetrics::new().unwrap();
        let second = DoqMetrics::new().unwrap();
        first.query_received();

        assert_eq!(first.queries(), 1);
        assert_eq!(second.queries(), 0);
    }

    #[test]
    fn test_prometheus_rendering() {
        let metrics = DoqMetrics::new().unwrap();
        metrics.query_received();

        let text = String::from_utf8(metrics.render().unwrap()).unwrap();
        assert!(text.contains("# TYPE doqd_queries_total counter"));
        assert!(text.contains("doqd_queries_total 1\n"));
        assert!(text.contains("doqd_valid_queries_total 0\n"));
        assert!(text.contains("doqd_upstream_errors_total 0\n"));
    }
}
