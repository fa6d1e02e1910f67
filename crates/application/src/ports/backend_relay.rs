use async_trait::async_trait;
use doqd_domain::DomainError;

#[async_trait]
pub trait BackendRelay: Send + Sync {
    /// Sends one raw DNS query to the backend and returns the raw answer.
    async fn exchange(&self, query: &[u8]) -> Result<Vec<u8>, DomainError>;

    fn backend_name(&self) -> String;
}
