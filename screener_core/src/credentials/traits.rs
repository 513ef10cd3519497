use crate::models::{AccountKey, IdentityRecord};
use crate::Result;
use async_trait::async_trait;

/// Durable key-value store of identity records, keyed by account.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, account: &AccountKey) -> Result<Option<IdentityRecord>>;

    /// All stored identities, ordered by account key.
    async fn list(&self) -> Result<Vec<IdentityRecord>>;

    /// Insert or replace a record. Token fields and expiry are replaced together.
    async fn upsert(&self, record: &IdentityRecord) -> Result<()>;
}

/// Outcome of a successful refresh-token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct ExchangedToken {
    pub access_token: String,
    /// Set when the provider rotated the refresh token.
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for ExchangedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangedToken")
            .field("access_token", &crate::o11y::redact(&self.access_token))
            .field("rotated_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Upstream token-exchange endpoint of the identity provider.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<ExchangedToken>;
}
