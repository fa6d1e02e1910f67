use doqd_domain::{DoqQuery, DomainError};

pub trait QueryCodec: Send + Sync {
    /// Decodes a query received on a stream and re-encodes it for relaying.
    fn decode_query(&self, wire: &[u8]) -> Result<DoqQuery, DomainError>;

    /// Decodes a backend answer and encodes it for the stream.
    fn encode_response(&self, wire: &[u8]) -> Result<Vec<u8>, DomainError>;
}
