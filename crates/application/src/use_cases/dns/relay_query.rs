use crate::ports::{BackendRelay, QueryCodec, QueryMetricsSink};
use doqd_domain::query::check_query_size;
use doqd_domain::DomainError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Turns the bytes read from one DoQ stream into the bytes to write back.
///
/// Every rejection happens before the backend is contacted.
pub struct RelayQueryUseCase {
    codec: Arc<dyn QueryCodec>,
    relay: Arc<dyn BackendRelay>,
    metrics: Arc<dyn QueryMetricsSink>,
}

impl RelayQueryUseCase {
    pub fn new(
        codec: Arc<dyn QueryCodec>,
        relay: Arc<dyn BackendRelay>,
        metrics: Arc<dyn QueryMetricsSink>,
    ) -> Self {
        Self {
            codec,
            relay,
            metrics,
        }
    }

    pub fn backend_name(&self) -> String {
        self.relay.backend_name()
    }

    pub async fn execute(&self, wire: &[u8]) -> Result<Vec<u8>, DomainError> {
        let start = Instant::now();
        self.metrics.query_received();

        check_query_size(wire.len())?;

        let query = self.codec.decode_query(wire)?;
        query.check_conformance()?;
        self.metrics.query_valid();

        debug!(
            id = query.id,
            name = %query.name,
            record_type = %query.record_type,
            "Relaying DoQ query"
        );

        let answer = match self.relay.exchange(&query.wire).await {
            Ok(answer) => answer,
            Err(e) => {
                if e.is_backend_failure() {
                    self.metrics.backend_error();
                }
                warn!(
                    name = %query.name,
                    backend = %self.relay.backend_name(),
                    error = %e,
                    "Backend relay failed"
                );
                return Err(e);
            }
        };

        let response = self.codec.encode_response(&answer).map_err(|e| {
            self.metrics.backend_error();
            warn!(
                name = %query.name,
                backend = %self.relay.backend_name(),
                error = %e,
                "Backend answer rejected"
            );
            e
        })?;

        debug!(
            id = query.id,
            name = %query.name,
            response_len = response.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Backend answered"
        );

        Ok(response)
    }
}
