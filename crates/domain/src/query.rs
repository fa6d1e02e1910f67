use crate::errors::DomainError;
use crate::protocol::{EDNS_TCP_KEEPALIVE, MIN_QUERY_SIZE};
use std::sync::Arc;

/// A DNS query decoded from one DoQ stream.
#[derive(Debug, Clone)]
pub struct DoqQuery {
    pub id: u16,
    /// Question name, empty when the message carries no question.
    pub name: Arc<str>,
    /// Question type mnemonic (`A`, `AAAA`, ...).
    pub record_type: Arc<str>,
    /// EDNS(0) option codes in the order they appear in the OPT record.
    pub edns_options: Vec<u16>,
    /// The message re-encoded for the backend.
    pub wire: Vec<u8>,
}

impl DoqQuery {
    pub fn has_edns_option(&self, code: u16) -> bool {
        self.edns_options.contains(&code)
    }

    /// A keep-alive hint is meaningless on an already-alive QUIC connection
    /// and its presence is a fatal protocol error.
    pub fn check_conformance(&self) -> Result<(), DomainError> {
        if self.has_edns_option(EDNS_TCP_KEEPALIVE) {
            return Err(DomainError::ProhibitedEdnsOption(EDNS_TCP_KEEPALIVE));
        }
        Ok(())
    }
}

pub fn check_query_size(len: usize) -> Result<(), DomainError> {
    if len < MIN_QUERY_SIZE {
        return Err(DomainError::UndersizedQuery {
            len,
            min: MIN_QUERY_SIZE,
        });
    }
    Ok(())
}
