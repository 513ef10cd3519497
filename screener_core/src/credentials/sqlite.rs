//! SQLite-backed CredentialStore.
//!
//! Persists identity records across restarts in a single WAL-mode SQLite file.
//!
//! Usage:
//! ```ignore
//! let store = SqliteCredentialStore::new("/path/to/credentials.db").await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use super::traits::CredentialStore;
use crate::models::{AccountKey, IdentityRecord};
use crate::{Error, Result};

/// A durable, file-backed CredentialStore (WAL mode).
#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Create (or open) the store at the given file path.
    ///
    /// Creates the file and parent directories if they don't exist and runs the
    /// schema migration on startup.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::backend("sqlite_credential_store", e))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", path.display()))
            .map_err(|e| Error::backend("sqlite_credential_store", e))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(|e| Error::backend("sqlite_credential_store", e))?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| Error::backend("sqlite_credential_store_migration", e))?;

        Ok(Self { pool })
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS identities (
    account TEXT PRIMARY KEY,
    access_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    token_expiry TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

fn db_err(e: sqlx::Error) -> Error {
    Error::backend("sqlite_credential_store", e)
}

fn parse_dt(column: &str, s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .map_err(|e| Error::backend(format!("sqlite_credential_store: bad {column}"), e))
}

fn row_to_record(r: &sqlx::sqlite::SqliteRow) -> Result<IdentityRecord> {
    let account: String = r.get("account");
    let expiry: String = r.get("token_expiry");
    let created_at: String = r.get("created_at");
    let updated_at: String = r.get("updated_at");
    Ok(IdentityRecord {
        account: AccountKey(account),
        access_token: r.get("access_token"),
        refresh_token: r.get("refresh_token"),
        token_expiry: parse_dt("token_expiry", &expiry)?,
        created_at: parse_dt("created_at", &created_at)?,
        updated_at: parse_dt("updated_at", &updated_at)?,
    })
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get(&self, account: &AccountKey) -> Result<Option<IdentityRecord>> {
        let row = sqlx::query(
            "SELECT account, access_token, refresh_token, token_expiry, created_at, updated_at
             FROM identities WHERE account = ?1",
        )
        .bind(account.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn list(&self) -> Result<Vec<IdentityRecord>> {
        let rows = sqlx::query(
            "SELECT account, access_token, refresh_token, token_expiry, created_at, updated_at
             FROM identities ORDER BY account",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_record).collect()
    }

    async fn upsert(&self, record: &IdentityRecord) -> Result<()> {
        // Single statement: token, refresh token and expiry change together.
        sqlx::query(
            "INSERT INTO identities (account, access_token, refresh_token, token_expiry, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(account) DO UPDATE SET
               access_token = excluded.access_token,
               refresh_token = excluded.refresh_token,
               token_expiry = excluded.token_expiry,
               updated_at = excluded.updated_at",
        )
        .bind(record.account.as_str())
        .bind(&record.access_token)
        .bind(&record.refresh_token)
        .bind(record.token_expiry.to_rfc3339())
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
