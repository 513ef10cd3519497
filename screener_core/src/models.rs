use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::o11y::redact;

/// Key under which an identity is stored (the provider's account id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountKey(pub String);

impl AccountKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Long-lived OAuth identity that authorizes both table reads and appends.
///
/// `token_expiry` is a local estimate (`issued_at + lifetime`), never parsed from
/// the provider response.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub account: AccountKey,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expiry: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdentityRecord {
    /// Build a record for a freshly authorized token pair.
    pub fn authorized(
        account: AccountKey,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        lifetime: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            account,
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_expiry: now + lifetime,
            created_at: now,
            updated_at: now,
        }
    }
}

// Tokens must never reach logs in clear.
impl fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("account", &self.account)
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("token_expiry", &self.token_expiry)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Locates a table: a spreadsheet id plus an A1-notation range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLocator {
    pub spreadsheet_id: String,
    pub range: String,
}

impl TableLocator {
    pub fn new(spreadsheet_id: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
        }
    }
}

impl fmt::Display for TableLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.spreadsheet_id, self.range)
    }
}

/// Raw table contents: row 0 is the header row.
pub type Rows = Vec<Vec<String>>;

/// One unconsumed source row keyed by the header row.
///
/// Keys are exactly the header values in header order; cells missing from a short
/// row are `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    /// Zero-based index of the row in the source table (header is row 0).
    pub row_index: u64,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl CandidateRecord {
    pub fn from_row(row_index: u64, headers: &[String], row: &[String]) -> Self {
        let mut fields = serde_json::Map::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            let value = row
                .get(i)
                .map(|cell| serde_json::Value::String(cell.clone()))
                .unwrap_or(serde_json::Value::Null);
            fields.insert(header.clone(), value);
        }
        Self { row_index, fields }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields.get(header).and_then(|v| v.as_str())
    }

    /// Serialized form submitted to the model as the sole user input.
    pub fn to_prompt(&self) -> crate::Result<String> {
        serde_json::to_string(&self.fields)
            .map_err(|e| crate::Error::backend("serialize candidate record", e))
    }
}

/// Closed set of verdicts the rubric allows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "Соответствует требованиям")]
    Accepted,
    #[serde(rename = "Нужна дополнительная проверка ментором")]
    NeedsMentorReview,
    #[serde(rename = "Не соответствует требованиям")]
    Rejected,
}

impl Decision {
    pub const ALL: [Decision; 3] = [
        Decision::Accepted,
        Decision::NeedsMentorReview,
        Decision::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accepted => "Соответствует требованиям",
            Decision::NeedsMentorReview => "Нужна дополнительная проверка ментором",
            Decision::Rejected => "Не соответствует требованиям",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated verdict for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Contact handle echoed back by the model.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub candidate_tg: String,
    pub summary: String,
    pub decision: Decision,
}

impl EvaluationResult {
    /// Destination column order.
    pub const COLUMNS: [&'static str; 3] = ["candidate_tg", "summary", "decision"];

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.candidate_tg.clone(),
            self.summary.clone(),
            self.decision.as_str().to_string(),
        ]
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
