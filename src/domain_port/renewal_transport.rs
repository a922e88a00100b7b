#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewedAccess {
    pub access_raw: String,
}

/// Exchanges a refresh credential for a fresh access credential.
/// Failures are final for the call; nothing is retried.
#[async_trait::async_trait]
pub trait RenewalTransport: Send + Sync {
    async fn renew(&self, refresh_raw: &str) -> Result<RenewedAccess, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("renewal request failed: {0}")]
    Request(String),
    #[error("renewal endpoint answered {0}")]
    Status(u16),
    #[error("renewal rejected: {0}")]
    Rejected(String),
    #[error("unexpected renewal response: {0}")]
    Body(String),
}
