//! Operator commands that only touch local state.

use chrono::Utc;
use screener_core::o11y::redact;
use screener_core::{
    is_token_valid, AccountKey, CredentialStore, CursorStorage, IdentityRecord, DEFAULT_CURSOR_KEY,
};

/// Store a freshly authorized token pair, stamping expiry `now + lifetime`.
#[tracing::instrument(level = "info", skip(store, access_token, refresh_token))]
pub async fn identity_put(
    store: &dyn CredentialStore,
    lifetime: chrono::Duration,
    account: &str,
    access_token: &str,
    refresh_token: &str,
) -> anyhow::Result<serde_json::Value> {
    if account.trim().is_empty() {
        anyhow::bail!("--account must not be empty");
    }
    if access_token.trim().is_empty() || refresh_token.trim().is_empty() {
        anyhow::bail!("access and refresh tokens must not be empty");
    }
    let record = IdentityRecord::authorized(
        AccountKey::new(account.trim()),
        access_token,
        refresh_token,
        lifetime,
        Utc::now(),
    );
    store.upsert(&record).await?;
    tracing::info!(account = %record.account, "identity stored");
    Ok(identity_json(&record))
}

pub async fn identity_list(store: &dyn CredentialStore) -> anyhow::Result<serde_json::Value> {
    let records = store.list().await?;
    Ok(serde_json::Value::Array(
        records.iter().map(identity_json).collect(),
    ))
}

fn identity_json(record: &IdentityRecord) -> serde_json::Value {
    serde_json::json!({
        "account": record.account.as_str(),
        "access_token": redact(&record.access_token),
        "refresh_token": redact(&record.refresh_token),
        "token_expiry": record.token_expiry.to_rfc3339(),
        "valid": is_token_valid(record, Utc::now()),
        "updated_at": record.updated_at.to_rfc3339(),
    })
}

pub async fn cursor_show(storage: &dyn CursorStorage) -> anyhow::Result<serde_json::Value> {
    let value = storage.read_int(DEFAULT_CURSOR_KEY).await?;
    Ok(serde_json::json!({
        "key": DEFAULT_CURSOR_KEY,
        "value": value.unwrap_or(0),
        "persisted": value.is_some(),
    }))
}

#[tracing::instrument(level = "info", skip(storage))]
pub async fn cursor_set(storage: &dyn CursorStorage, value: u64) -> anyhow::Result<serde_json::Value> {
    let previous = storage.read_int(DEFAULT_CURSOR_KEY).await?;
    storage.write_int(DEFAULT_CURSOR_KEY, value).await?;
    tracing::info!(previous = ?previous, value, "cursor overwritten");
    Ok(serde_json::json!({
        "key": DEFAULT_CURSOR_KEY,
        "previous": previous,
        "value": value,
    }))
}
