use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::CursorStorage;
use crate::{Error, Result};

/// In-memory CursorStorage for local development and unit tests.
///
/// `fail_writes` makes every write return an error, to exercise the best-effort path.
#[derive(Clone, Default)]
pub struct MemoryCursorStorage {
    values: Arc<Mutex<HashMap<String, u64>>>,
    fail_writes: bool,
}

impl MemoryCursorStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// Snapshot of a stored value (primarily for tests).
    pub async fn peek(&self, key: &str) -> Option<u64> {
        self.values.lock().await.get(key).copied()
    }
}

#[async_trait]
impl CursorStorage for MemoryCursorStorage {
    async fn read_int(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.values.lock().await.get(key).copied())
    }

    async fn write_int(&self, key: &str, value: u64) -> Result<()> {
        if self.fail_writes {
            return Err(Error::BackendMessage("memory cursor storage: write refused".to_string()));
        }
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}
