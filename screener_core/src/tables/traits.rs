use crate::models::{Rows, TableLocator};
use crate::Result;
use async_trait::async_trait;

/// Reads a whole table. Row 0 of the result is the header row.
#[async_trait]
pub trait TableSource: Send + Sync {
    async fn read(&self, access_token: &str, table: &TableLocator) -> Result<Rows>;
}

/// Appends rows after the last row of a table; never overwrites.
#[async_trait]
pub trait TableSink: Send + Sync {
    async fn append(&self, access_token: &str, table: &TableLocator, rows: Rows) -> Result<()>;
}
