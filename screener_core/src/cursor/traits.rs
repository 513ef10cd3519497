use crate::Result;
use async_trait::async_trait;

/// Durable scalar storage keyed by name.
#[async_trait]
pub trait CursorStorage: Send + Sync {
    /// Returns `Ok(None)` when nothing has been persisted under `key`.
    async fn read_int(&self, key: &str) -> Result<Option<u64>>;

    async fn write_int(&self, key: &str, value: u64) -> Result<()>;
}
