use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::CredentialStore;
use crate::models::{AccountKey, IdentityRecord};
use crate::Result;

/// In-memory CredentialStore for local development and unit tests.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    records: Arc<Mutex<BTreeMap<AccountKey, IdentityRecord>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = IdentityRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.account.clone(), r))
            .collect();
        Self {
            records: Arc::new(Mutex::new(map)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, account: &AccountKey) -> Result<Option<IdentityRecord>> {
        Ok(self.records.lock().await.get(account).cloned())
    }

    async fn list(&self) -> Result<Vec<IdentityRecord>> {
        Ok(self.records.lock().await.values().cloned().collect())
    }

    async fn upsert(&self, record: &IdentityRecord) -> Result<()> {
        self.records
            .lock()
            .await
            .insert(record.account.clone(), record.clone());
        Ok(())
    }
}
