//! Best-effort extraction of the verdict object from free-text model output.
//!
//! Models wrap JSON in prose or markdown fences. Two strategies:
//! - `FirstBraces`: slice from the first `{` to the first `}` inclusive. Breaks on
//!   nested objects and on braces inside string values.
//! - `Balanced`: from each `{` in order, scan to its matching `}` (string and escape
//!   aware) and take the first span that parses. Only the first
//!   `MAX_BALANCED_STARTS` opening braces are tried.
//!
//! Either way a failure is reported, never panicked on; callers skip the candidate.

use crate::models::EvaluationResult;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ExtractionStrategy {
    FirstBraces,
    #[default]
    Balanced,
}

impl ExtractionStrategy {
    #[tracing::instrument(level = "debug")]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_braces" | "first-braces" => Some(Self::FirstBraces),
            "balanced" => Some(Self::Balanced),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("response contains no JSON object")]
    NoObject,

    #[error("response JSON is malformed: {0}")]
    Malformed(String),

    #[error("response JSON does not match the result schema: {0}")]
    Schema(String),
}

/// Opening braces tried by `Balanced` before giving up.
pub const MAX_BALANCED_STARTS: usize = 32;

/// Candidate `{...}` spans in the order they should be tried.
pub fn candidate_spans(response: &str, strategy: ExtractionStrategy) -> Vec<&str> {
    match strategy {
        ExtractionStrategy::FirstBraces => {
            match (response.find('{'), response.find('}')) {
                (Some(begin), Some(end)) if end > begin => vec![&response[begin..=end]],
                // A `}` before the first `{` still counts as a (malformed) span.
                (Some(_), Some(_)) => vec![""],
                _ => Vec::new(),
            }
        }
        ExtractionStrategy::Balanced => response
            .char_indices()
            .filter(|(_, c)| *c == '{')
            .take(MAX_BALANCED_STARTS)
            .filter_map(|(start, _)| balanced_end(response, start).map(|end| &response[start..=end]))
            .collect(),
    }
}

/// Byte offset of the `}` closing the object that opens at `start`.
fn balanced_end(s: &str, start: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract and validate the verdict.
///
/// With `Balanced`, spans that parse but fail validation are skipped in favor of a
/// later span that validates; the first error is reported if none does.
pub fn parse_evaluation(
    response: &str,
    strategy: ExtractionStrategy,
) -> Result<EvaluationResult, ExtractError> {
    let spans = candidate_spans(response, strategy);
    if spans.is_empty() && !response.contains('{') {
        return Err(ExtractError::NoObject);
    }

    let mut first_err: Option<ExtractError> = None;
    for span in spans {
        let value = match serde_json::from_str::<serde_json::Value>(span) {
            Ok(v @ serde_json::Value::Object(_)) => v,
            Ok(other) => {
                first_err.get_or_insert(ExtractError::Malformed(format!(
                    "expected object, got {other}"
                )));
                continue;
            }
            Err(e) => {
                first_err.get_or_insert(ExtractError::Malformed(e.to_string()));
                continue;
            }
        };
        match serde_json::from_value::<EvaluationResult>(value) {
            Ok(result) => return Ok(result),
            Err(e) => {
                first_err.get_or_insert(ExtractError::Schema(e.to_string()));
            }
        }
    }
    Err(first_err.unwrap_or_else(|| ExtractError::Malformed("unterminated object".to_string())))
}
