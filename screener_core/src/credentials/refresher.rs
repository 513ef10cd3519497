use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::traits::{CredentialStore, TokenExchange};
use crate::models::{AccountKey, IdentityRecord};
use crate::pipeline::models::FailureKind;
use crate::{Error, Result};

/// Default local estimate of an access token's lifetime, in seconds.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Pure predicate: a token may be handed out only while `now < token_expiry`.
pub fn is_token_valid(record: &IdentityRecord, now: DateTime<Utc>) -> bool {
    now < record.token_expiry
}

/// Result of one sweep over every stored identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub refreshed: Vec<AccountKey>,
    pub failed: Vec<AccountKey>,
}

/// Hands out valid access tokens and keeps stored identities fresh.
#[derive(Clone)]
pub struct TokenRefresher {
    store: Arc<dyn CredentialStore>,
    exchange: Arc<dyn TokenExchange>,
    lifetime: Duration,
}

impl TokenRefresher {
    #[tracing::instrument(level = "debug", skip(store, exchange))]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        exchange: Arc<dyn TokenExchange>,
        lifetime: Duration,
    ) -> Result<Self> {
        if lifetime <= Duration::zero() {
            return Err(Error::InvalidInput("token lifetime must be > 0".to_string()));
        }
        Ok(Self {
            store,
            exchange,
            lifetime,
        })
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Resolve which identity authorizes a run: the configured account, or the first
    /// stored identity when none is configured.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn resolve_identity(&self, account: Option<&AccountKey>) -> Result<IdentityRecord> {
        match account {
            Some(key) => self
                .store
                .get(key)
                .await?
                .ok_or_else(|| Error::NotFound(format!("identity for account '{key}'"))),
            None => self
                .store
                .list()
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| Error::NotFound("no stored identity".to_string())),
        }
    }

    /// Exchange the refresh token and persist the new access token and expiry.
    ///
    /// Effectful; does not look at the current expiry.
    #[tracing::instrument(level = "info", skip(self, record), fields(account = %record.account))]
    pub async fn refresh(
        &self,
        record: &IdentityRecord,
        now: DateTime<Utc>,
    ) -> Result<IdentityRecord> {
        let exchanged = self
            .exchange
            .exchange_refresh_token(&record.refresh_token)
            .await?;

        let mut next = record.clone();
        next.access_token = exchanged.access_token;
        if let Some(rotated) = exchanged.refresh_token {
            next.refresh_token = rotated;
        }
        next.token_expiry = now + self.lifetime;
        next.updated_at = now;

        self.store.upsert(&next).await?;
        tracing::info!(expires_at = %next.token_expiry, "access token refreshed");
        Ok(next)
    }

    /// Return an access token for `record`, refreshing it first when it has expired.
    ///
    /// On exchange failure the stale token is returned unchanged; the caller's next
    /// request will then surface the authorization failure.
    #[tracing::instrument(level = "debug", skip(self, record), fields(account = %record.account))]
    pub async fn get_valid_token_at(&self, record: &IdentityRecord, now: DateTime<Utc>) -> String {
        if is_token_valid(record, now) {
            return record.access_token.clone();
        }
        match self.refresh(record, now).await {
            Ok(next) => next.access_token,
            Err(e) => {
                tracing::error!(
                    failure = %FailureKind::Auth,
                    error = %e,
                    "token refresh failed; reusing stale access token"
                );
                record.access_token.clone()
            }
        }
    }

    /// Look up `account` in the store and return a valid access token for it.
    ///
    /// The store is re-read on every call so a refresh done by the sweep is picked up.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_valid_token(&self, account: Option<&AccountKey>) -> Result<String> {
        let record = self.resolve_identity(account).await?;
        Ok(self.get_valid_token_at(&record, Utc::now()).await)
    }

    /// Refresh every stored identity unconditionally, regardless of expiry.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        for record in self.store.list().await? {
            match self.refresh(&record, now).await {
                Ok(_) => report.refreshed.push(record.account),
                Err(e) => {
                    tracing::error!(
                        account = %record.account,
                        failure = %FailureKind::Auth,
                        error = %e,
                        "sweep refresh failed"
                    );
                    report.failed.push(record.account);
                }
            }
        }
        tracing::info!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            "token sweep finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::memory::MemoryCredentialStore;
    use crate::test_support::ScriptedExchange;

    fn record(key: &str, expiry: DateTime<Utc>) -> IdentityRecord {
        IdentityRecord {
            account: AccountKey::new(key),
            access_token: format!("old-{key}"),
            refresh_token: format!("refresh-{key}"),
            token_expiry: expiry,
            created_at: expiry - Duration::hours(1),
            updated_at: expiry - Duration::hours(1),
        }
    }

    fn refresher(
        store: &MemoryCredentialStore,
        exchange: &Arc<ScriptedExchange>,
    ) -> TokenRefresher {
        TokenRefresher::new(
            Arc::new(store.clone()),
            exchange.clone(),
            Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS),
        )
        .unwrap()
    }

    #[test]
    fn validity_is_strictly_before_expiry() {
        let now = Utc::now();
        assert!(is_token_valid(&record("a", now + Duration::seconds(1)), now));
        assert!(!is_token_valid(&record("a", now), now));
        assert!(!is_token_valid(&record("a", now - Duration::seconds(1)), now));
    }

    #[tokio::test]
    async fn valid_token_is_returned_without_exchange() {
        let now = Utc::now();
        let rec = record("a", now + Duration::minutes(30));
        let store = MemoryCredentialStore::with_records([rec.clone()]);
        let exchange = Arc::new(ScriptedExchange::succeeding());
        let r = refresher(&store, &exchange);

        assert_eq!(r.get_valid_token_at(&rec, now).await, "old-a");
        assert_eq!(exchange.calls(), 0);
    }

    #[tokio::test]
    async fn expired_token_triggers_exactly_one_refresh() {
        let now = Utc::now();
        let rec = record("a", now - Duration::minutes(1));
        let store = MemoryCredentialStore::with_records([rec.clone()]);
        let exchange = Arc::new(ScriptedExchange::succeeding());
        let r = refresher(&store, &exchange);

        let token = r.get_valid_token_at(&rec, now).await;
        assert_eq!(exchange.calls(), 1);
        assert_ne!(token, "old-a");

        let stored = store.get(&rec.account).await.unwrap().unwrap();
        assert_eq!(stored.access_token, token);
        assert!(stored.token_expiry > rec.token_expiry);
        assert_eq!(
            stored.token_expiry,
            now + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS)
        );
    }

    #[tokio::test]
    async fn failed_exchange_returns_stale_token_and_keeps_record() {
        let now = Utc::now();
        let rec = record("a", now - Duration::minutes(1));
        let store = MemoryCredentialStore::with_records([rec.clone()]);
        let exchange = Arc::new(ScriptedExchange::failing());
        let r = refresher(&store, &exchange);

        assert_eq!(r.get_valid_token_at(&rec, now).await, "old-a");
        assert_eq!(exchange.calls(), 1);
        assert_eq!(store.get(&rec.account).await.unwrap().unwrap(), rec);
    }

    #[tokio::test]
    async fn rotated_refresh_token_replaces_stored_one() {
        let now = Utc::now();
        let rec = record("a", now - Duration::minutes(1));
        let store = MemoryCredentialStore::with_records([rec.clone()]);
        let exchange = Arc::new(ScriptedExchange::rotating());
        let r = refresher(&store, &exchange);

        let next = r.refresh(&rec, now).await.unwrap();
        assert_ne!(next.refresh_token, rec.refresh_token);
        assert_eq!(store.get(&rec.account).await.unwrap().unwrap(), next);
    }

    #[tokio::test]
    async fn sweep_refreshes_unexpired_identities_too() {
        let now = Utc::now();
        let store = MemoryCredentialStore::with_records([
            record("a", now + Duration::minutes(50)),
            record("b", now - Duration::minutes(5)),
        ]);
        let exchange = Arc::new(ScriptedExchange::succeeding());
        let r = refresher(&store, &exchange);

        let report = r.sweep(now).await.unwrap();
        assert_eq!(exchange.calls(), 2);
        assert_eq!(
            report.refreshed,
            vec![AccountKey::new("a"), AccountKey::new("b")]
        );
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn sweep_reports_failures_per_identity() {
        let now = Utc::now();
        let store = MemoryCredentialStore::with_records([record("a", now)]);
        let exchange = Arc::new(ScriptedExchange::failing());
        let r = refresher(&store, &exchange);

        let report = r.sweep(now).await.unwrap();
        assert_eq!(report.failed, vec![AccountKey::new("a")]);
    }

    #[tokio::test]
    async fn resolve_identity_defaults_to_first_account() {
        let now = Utc::now();
        let store = MemoryCredentialStore::with_records([record("z", now), record("m", now)]);
        let exchange = Arc::new(ScriptedExchange::succeeding());
        let r = refresher(&store, &exchange);

        assert_eq!(r.resolve_identity(None).await.unwrap().account.as_str(), "m");
        assert!(matches!(
            r.resolve_identity(Some(&AccountKey::new("nope"))).await,
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn zero_lifetime_is_rejected() {
        let store = MemoryCredentialStore::new();
        let exchange = Arc::new(ScriptedExchange::succeeding());
        assert!(TokenRefresher::new(Arc::new(store), exchange, Duration::zero()).is_err());
    }
}
