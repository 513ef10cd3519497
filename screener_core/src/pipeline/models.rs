use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{AccountKey, TableLocator};

/// Failure taxonomy attached to every failure log event and counted per tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Token exchange rejected; the stale token is reused.
    Auth,
    /// Table fetch failed; the tick aborts with the cursor unchanged.
    SourceRead,
    /// Inference call failed; the candidate is skipped.
    ModelCall,
    /// No usable JSON verdict in the response; the candidate is skipped.
    ResponseParse,
    /// Append failed; the result is lost and the loop continues.
    SinkWrite,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Auth => "auth_failure",
            FailureKind::SourceRead => "source_read_failure",
            FailureKind::ModelCall => "model_call_failure",
            FailureKind::ResponseParse => "response_parse_failure",
            FailureKind::SinkWrite => "sink_write_failure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the cursor is persisted relative to evaluation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorAdvance {
    /// Save `rows.len() - 1` right after the read. A row is evaluated at most once;
    /// a crash mid-batch drops the rest of the batch.
    #[default]
    BeforeEvaluation,
    /// Save each record's row index once it has been handled. A crash mid-batch
    /// re-evaluates at most the in-flight record.
    AfterEachRecord,
}

impl CursorAdvance {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before_evaluation" => Some(Self::BeforeEvaluation),
            "after_each_record" => Some(Self::AfterEachRecord),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeEvaluation => "before_evaluation",
            Self::AfterEachRecord => "after_each_record",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub source: TableLocator,
    pub target: TableLocator,
    /// Identity that authorizes reads and appends; `None` picks the first stored one.
    pub account: Option<AccountKey>,
    pub cursor_advance: CursorAdvance,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick_id: String,
    pub cursor_before: u64,
    pub cursor_after: u64,
    pub records_read: usize,
    pub evaluated: usize,
    pub appended: usize,
    pub model_call_failures: usize,
    pub response_parse_failures: usize,
    pub sink_write_failures: usize,
    /// Set when the tick aborted before its batch started.
    pub aborted: Option<FailureKind>,
}

impl TickReport {
    pub fn record_failure(&mut self, kind: FailureKind) {
        match kind {
            FailureKind::ModelCall => self.model_call_failures += 1,
            FailureKind::ResponseParse => self.response_parse_failures += 1,
            FailureKind::SinkWrite => self.sink_write_failures += 1,
            FailureKind::Auth | FailureKind::SourceRead => self.aborted = Some(kind),
        }
    }
}
