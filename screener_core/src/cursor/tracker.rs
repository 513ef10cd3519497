use std::sync::Arc;

use super::traits::CursorStorage;

/// Well-known storage key of the source cursor.
pub const DEFAULT_CURSOR_KEY: &str = "last_fetched_row_index";

/// In-process view of the cursor, written through to durable storage.
///
/// `value` is the zero-based index of the last source row already handed to the
/// evaluator; it never decreases.
pub struct CursorTracker {
    storage: Arc<dyn CursorStorage>,
    key: String,
    value: u64,
}

impl CursorTracker {
    /// Load the persisted cursor. Missing or unreadable values start at 0.
    #[tracing::instrument(level = "info", skip(storage))]
    pub async fn load(storage: Arc<dyn CursorStorage>, key: &str) -> Self {
        let value = match storage.read_int(key).await {
            Ok(Some(v)) => v,
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(error = %e, "cursor unreadable; starting from 0");
                0
            }
        };
        tracing::info!(cursor = value, "cursor loaded");
        Self {
            storage,
            key: key.to_string(),
            value,
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Move the cursor forward to `index` and persist it.
    ///
    /// A smaller `index` (the source shrank) is ignored with a warning. Returns the
    /// cursor value after the call.
    #[tracing::instrument(level = "debug", skip(self), fields(cursor = self.value))]
    pub async fn advance_to(&mut self, index: u64) -> u64 {
        if index < self.value {
            tracing::warn!(
                requested = index,
                "source has fewer rows than the cursor covers; keeping cursor"
            );
            return self.value;
        }
        if index == self.value {
            return self.value;
        }
        self.value = index;
        self.save(index).await;
        self.value
    }

    /// Write-through, best-effort: a failed write is logged, never returned.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn save(&self, index: u64) {
        if let Err(e) = self.storage.write_int(&self.key, index).await {
            tracing::error!(
                error = %e,
                cursor = index,
                "failed to persist cursor; rows may be re-processed after a restart"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::memory::MemoryCursorStorage;
    use crate::cursor::traits::CursorStorage;

    #[tokio::test]
    async fn load_defaults_to_zero() {
        let storage = MemoryCursorStorage::new();
        let t = CursorTracker::load(Arc::new(storage), DEFAULT_CURSOR_KEY).await;
        assert_eq!(t.value(), 0);
    }

    #[tokio::test]
    async fn load_picks_up_persisted_value() {
        let storage = MemoryCursorStorage::new();
        storage.write_int(DEFAULT_CURSOR_KEY, 7).await.unwrap();
        let t = CursorTracker::load(Arc::new(storage), DEFAULT_CURSOR_KEY).await;
        assert_eq!(t.value(), 7);
    }

    #[tokio::test]
    async fn advance_is_monotonic_and_written_through() {
        let storage = MemoryCursorStorage::new();
        let mut t = CursorTracker::load(Arc::new(storage.clone()), DEFAULT_CURSOR_KEY).await;

        assert_eq!(t.advance_to(5).await, 5);
        assert_eq!(storage.peek(DEFAULT_CURSOR_KEY).await, Some(5));

        assert_eq!(t.advance_to(3).await, 5);
        assert_eq!(storage.peek(DEFAULT_CURSOR_KEY).await, Some(5));

        assert_eq!(t.advance_to(5).await, 5);
        assert_eq!(t.advance_to(9).await, 9);
        assert_eq!(storage.peek(DEFAULT_CURSOR_KEY).await, Some(9));
    }

    #[tokio::test]
    async fn write_failure_is_not_fatal() {
        let storage = MemoryCursorStorage::failing_writes();
        let mut t = CursorTracker::load(Arc::new(storage.clone()), DEFAULT_CURSOR_KEY).await;

        assert_eq!(t.advance_to(4).await, 4);
        assert_eq!(storage.peek(DEFAULT_CURSOR_KEY).await, None);
    }
}
