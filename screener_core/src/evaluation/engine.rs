use std::sync::Arc;

use super::extract::{parse_evaluation, ExtractError, ExtractionStrategy};
use super::traits::InferenceClient;
use crate::models::{CandidateRecord, EvaluationResult};
use crate::pipeline::models::FailureKind;

/// Why a single candidate produced no result.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationFailure {
    #[error("model call failed: {0}")]
    ModelCall(crate::Error),

    #[error("model response rejected: {0}")]
    ResponseParse(ExtractError),
}

impl EvaluationFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ModelCall(_) => FailureKind::ModelCall,
            Self::ResponseParse(_) => FailureKind::ResponseParse,
        }
    }
}

/// One model call per candidate, then extraction and validation of the verdict.
///
/// Pacing is not done here; the pipeline wraps each call with its `RateLimiter`.
#[derive(Clone)]
pub struct Evaluator {
    client: Arc<dyn InferenceClient>,
    strategy: ExtractionStrategy,
}

impl Evaluator {
    pub fn new(client: Arc<dyn InferenceClient>, strategy: ExtractionStrategy) -> Self {
        Self { client, strategy }
    }

    pub fn strategy(&self) -> ExtractionStrategy {
        self.strategy
    }

    #[tracing::instrument(level = "debug", skip(self, record), fields(row_index = record.row_index))]
    pub async fn try_evaluate(
        &self,
        record: &CandidateRecord,
    ) -> Result<EvaluationResult, EvaluationFailure> {
        let prompt = record.to_prompt().map_err(EvaluationFailure::ModelCall)?;
        let response = self
            .client
            .generate(&prompt)
            .await
            .map_err(EvaluationFailure::ModelCall)?;
        tracing::debug!(response_len = response.len(), "model responded");
        parse_evaluation(&response, self.strategy).map_err(EvaluationFailure::ResponseParse)
    }

    /// Skip-on-failure wrapper: failures are logged with their kind and yield `None`.
    #[tracing::instrument(level = "info", skip(self, record), fields(row_index = record.row_index))]
    pub async fn evaluate(&self, record: &CandidateRecord) -> Option<EvaluationResult> {
        match self.try_evaluate(record).await {
            Ok(result) => {
                tracing::info!(decision = %result.decision, "candidate evaluated");
                Some(result)
            }
            Err(e) => {
                tracing::warn!(failure = %e.kind(), error = %e, "candidate skipped");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Decision;
    use crate::test_support::ScriptedInference;

    fn alice() -> CandidateRecord {
        let headers = vec!["name".to_string(), "github".to_string()];
        CandidateRecord::from_row(1, &headers, &["Alice".to_string(), "alice-gh".to_string()])
    }

    #[tokio::test]
    async fn record_is_sent_as_json_and_verdict_is_parsed() {
        let client = Arc::new(ScriptedInference::new([Ok(
            "```json\n{\"candidate_tg\": \"@alice\", \"summary\": \"ok\", \"decision\": \"Соответствует требованиям\"}\n```"
                .to_string(),
        )]));
        let evaluator = Evaluator::new(client.clone(), ExtractionStrategy::Balanced);

        let result = evaluator.evaluate(&alice()).await.unwrap();
        assert_eq!(result.decision, Decision::Accepted);
        assert_eq!(
            client.prompts().await,
            vec![r#"{"name":"Alice","github":"alice-gh"}"#.to_string()]
        );
    }

    #[tokio::test]
    async fn refusal_text_is_a_parse_failure() {
        let client = Arc::new(ScriptedInference::new([Ok(
            "I cannot evaluate this candidate.".to_string(),
        )]));
        let evaluator = Evaluator::new(client, ExtractionStrategy::FirstBraces);

        let err = evaluator.try_evaluate(&alice()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::ResponseParse);
    }

    #[tokio::test]
    async fn transport_error_is_a_model_call_failure() {
        let client = Arc::new(ScriptedInference::new([Err(
            crate::Error::BackendMessage("503".to_string()),
        )]));
        let evaluator = Evaluator::new(client, ExtractionStrategy::Balanced);

        let err = evaluator.try_evaluate(&alice()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::ModelCall);
        assert!(evaluator.evaluate(&alice()).await.is_none());
    }
}
