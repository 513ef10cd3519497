use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::{TableSink, TableSource};
use crate::models::{Rows, TableLocator};
use crate::{Error, Result};

/// In-memory tables for local development and unit tests.
///
/// Tables are keyed by spreadsheet id; the range is ignored. Reads of an unknown
/// table return an empty table, like an empty sheet.
#[derive(Clone, Default)]
pub struct MemoryTables {
    tables: Arc<Mutex<HashMap<String, Rows>>>,
    fail_reads: Arc<Mutex<bool>>,
    fail_appends: Arc<Mutex<bool>>,
}

impl MemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, table: &TableLocator, rows: Rows) {
        self.tables
            .lock()
            .await
            .insert(table.spreadsheet_id.clone(), rows);
    }

    /// Snapshot of a table (primarily for tests).
    pub async fn rows(&self, table: &TableLocator) -> Rows {
        self.tables
            .lock()
            .await
            .get(&table.spreadsheet_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().await = fail;
    }

    pub async fn set_fail_appends(&self, fail: bool) {
        *self.fail_appends.lock().await = fail;
    }
}

#[async_trait]
impl TableSource for MemoryTables {
    async fn read(&self, _access_token: &str, table: &TableLocator) -> Result<Rows> {
        if *self.fail_reads.lock().await {
            return Err(Error::BackendMessage(format!("read {table} refused")));
        }
        Ok(self.rows(table).await)
    }
}

#[async_trait]
impl TableSink for MemoryTables {
    async fn append(&self, _access_token: &str, table: &TableLocator, rows: Rows) -> Result<()> {
        if *self.fail_appends.lock().await {
            return Err(Error::BackendMessage(format!("append {table} refused")));
        }
        self.tables
            .lock()
            .await
            .entry(table.spreadsheet_id.clone())
            .or_default()
            .extend(rows);
        Ok(())
    }
}
