use std::sync::Arc;

use super::traits::TableSource;
use crate::models::{CandidateRecord, Rows, TableLocator};
use crate::Result;

/// Records read in one pull plus the cursor value that covers them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceBatch {
    pub records: Vec<CandidateRecord>,
    /// `rows.len() - 1` at the moment of the read (total data rows seen), 0 for an
    /// empty table. This is what the cursor advances to, not `records.len()`.
    pub last_row_index: u64,
}

/// Compute the unconsumed suffix `rows[cursor + 1..]` and key each row by the header.
///
/// Row 0 is the header, so a cursor of 0 starts at the first data row.
pub fn unconsumed_records(rows: &Rows, cursor: u64) -> SourceBatch {
    let Some(headers) = rows.first() else {
        return SourceBatch::default();
    };
    let last_row_index = (rows.len() - 1) as u64;
    let start = usize::try_from(cursor.saturating_add(1)).unwrap_or(usize::MAX);

    let records = rows
        .iter()
        .enumerate()
        .skip(start)
        .map(|(i, row)| CandidateRecord::from_row(i as u64, headers, row))
        .collect();

    SourceBatch {
        records,
        last_row_index,
    }
}

/// Pulls the full source table and returns only rows past the cursor.
#[derive(Clone)]
pub struct SourceReader {
    source: Arc<dyn TableSource>,
    table: TableLocator,
}

impl SourceReader {
    pub fn new(source: Arc<dyn TableSource>, table: TableLocator) -> Self {
        Self { source, table }
    }

    pub fn table(&self) -> &TableLocator {
        &self.table
    }

    /// Read-only; the caller advances the cursor with `last_row_index`.
    #[tracing::instrument(level = "info", skip(self, access_token), fields(table = %self.table))]
    pub async fn fetch_new_records(&self, access_token: &str, cursor: u64) -> Result<SourceBatch> {
        let rows = self.source.read(access_token, &self.table).await?;
        if rows.is_empty() {
            tracing::info!("source table is empty");
        }
        let batch = unconsumed_records(&rows, cursor);
        tracing::info!(
            total_rows = rows.len(),
            new_records = batch.records.len(),
            "source table read"
        );
        Ok(batch)
    }
}
