#![allow(dead_code)]

use async_trait::async_trait;
use doqd_application::ports::{BackendRelay, QueryCodec, QueryMetricsSink};
use doqd_domain::{DoqQuery, DomainError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockBackendRelay {
    response: Arc<Mutex<Result<Vec<u8>, DomainError>>>,
    received: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockBackendRelay {
    pub fn answering(response: Vec<u8>) -> Self {
        Self {
            response: Arc::new(Mutex::new(Ok(response))),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(error: DomainError) -> Self {
        Self {
            response: Arc::new(Mutex::new(Err(error))),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendRelay for MockBackendRelay {
    async fn exchange(&self, query: &[u8]) -> Result<Vec<u8>, DomainError> {
        self.received.lock().unwrap().push(query.to_vec());
        self.response.lock().unwrap().clone()
    }

    fn backend_name(&self) -> String {
        "mock-backend".to_string()
    }
}

/// Codec that reports a fixed set of EDNS options and echoes the wire bytes.
pub struct MockQueryCodec {
    edns_options: Vec<u16>,
    decode_error: Option<DomainError>,
    response_error: Option<DomainError>,
}

impl MockQueryCodec {
    pub fn new() -> Self {
        Self {
            edns_options: vec![],
            decode_error: None,
            response_error: None,
        }
    }

    pub fn with_edns_options(mut self, options: Vec<u16>) -> Self {
        self.edns_options = options;
        self
    }

    pub fn failing_decode(mut self, error: DomainError) -> Self {
        self.decode_error = Some(error);
        self
    }

    pub fn failing_response(mut self, error: DomainError) -> Self {
        self.response_error = Some(error);
        self
    }
}

impl QueryCodec for MockQueryCodec {
    fn decode_query(&self, wire: &[u8]) -> Result<DoqQuery, DomainError> {
        if let Some(e) = &self.decode_error {
            return Err(e.clone());
        }
        Ok(DoqQuery {
            id: u16::from_be_bytes([wire[0], wire[1]]),
            name: "example.com.".into(),
            record_type: "A".into(),
            edns_options: self.edns_options.clone(),
            wire: wire.to_vec(),
        })
    }

    fn encode_response(&self, wire: &[u8]) -> Result<Vec<u8>, DomainError> {
        if let Some(e) = &self.response_error {
            return Err(e.clone());
        }
        Ok(wire.to_vec())
    }
}

#[derive(Default)]
pub struct MockMetrics {
    pub received: AtomicU64,
    pub valid: AtomicU64,
    pub backend_errors: AtomicU64,
}

impl MockMetrics {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.received.load(Ordering::Relaxed),
            self.valid.load(Ordering::Relaxed),
            self.backend_errors.load(Ordering::Relaxed),
        )
    }
}

impl QueryMetricsSink for MockMetrics {
    fn query_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    fn query_valid(&self) {
        self.valid.fetch_add(1, Ordering::Relaxed);
    }

    fn backend_error(&self) {
        self.backend_errors.fetch_add(1, Ordering::Relaxed);
    }
}
