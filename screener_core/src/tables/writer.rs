use std::sync::Arc;

use super::traits::TableSink;
use crate::models::{EvaluationResult, TableLocator};
use crate::Result;

/// Appends each validated result as one new destination row.
#[derive(Clone)]
pub struct SinkWriter {
    sink: Arc<dyn TableSink>,
    table: TableLocator,
}

impl SinkWriter {
    pub fn new(sink: Arc<dyn TableSink>, table: TableLocator) -> Self {
        Self { sink, table }
    }

    pub fn table(&self) -> &TableLocator {
        &self.table
    }

    /// Columns follow `EvaluationResult::COLUMNS`.
    #[tracing::instrument(level = "debug", skip(self, access_token, result), fields(table = %self.table))]
    pub async fn append(&self, access_token: &str, result: &EvaluationResult) -> Result<()> {
        self.sink
            .append(access_token, &self.table, vec![result.to_row()])
            .await?;
        tracing::info!(decision = %result.decision, "result appended to sink");
        Ok(())
    }
}
