use std::sync::Arc;

use tokio::sync::Mutex;

use super::models::{CursorAdvance, FailureKind, PipelineConfig, TickReport};
use crate::credentials::refresher::TokenRefresher;
use crate::cursor::tracker::CursorTracker;
use crate::evaluation::engine::Evaluator;
use crate::evaluation::pacing::RateLimiter;
use crate::tables::reader::SourceReader;
use crate::tables::writer::SinkWriter;

/// One end-to-end screening run: read, advance cursor, evaluate sequentially under
/// the rate limiter, append each verdict.
///
/// The cursor lives behind an async mutex held for the whole tick, so two ticks on
/// the same pipeline never interleave even without the scheduler's guard.
pub struct ScreeningPipeline {
    config: PipelineConfig,
    refresher: Arc<TokenRefresher>,
    reader: SourceReader,
    evaluator: Evaluator,
    limiter: Arc<dyn RateLimiter>,
    writer: SinkWriter,
    cursor: Mutex<CursorTracker>,
}

impl ScreeningPipeline {
    pub fn new(
        config: PipelineConfig,
        refresher: Arc<TokenRefresher>,
        reader: SourceReader,
        evaluator: Evaluator,
        limiter: Arc<dyn RateLimiter>,
        writer: SinkWriter,
        cursor: CursorTracker,
    ) -> Self {
        Self {
            config,
            refresher,
            reader,
            evaluator,
            limiter,
            writer,
            cursor: Mutex::new(cursor),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn cursor(&self) -> u64 {
        self.cursor.lock().await.value()
    }

    /// Run one tick to completion. Never returns an error: failures before the batch
    /// abort the tick (cursor unchanged), per-candidate failures are skipped.
    #[tracing::instrument(level = "info", skip(self), fields(tick_id))]
    pub async fn run_tick(&self) -> TickReport {
        let tick_id = uuid::Uuid::new_v4().to_string();
        tracing::Span::current().record("tick_id", tick_id.as_str());

        let mut cursor = self.cursor.lock().await;
        let mut report = TickReport {
            tick_id,
            cursor_before: cursor.value(),
            cursor_after: cursor.value(),
            ..TickReport::default()
        };
        let account = self.config.account.as_ref();

        let token = match self.refresher.get_valid_token(account).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(failure = %FailureKind::Auth, error = %e, "no usable identity; tick aborted");
                report.record_failure(FailureKind::Auth);
                return report;
            }
        };

        let batch = match self.reader.fetch_new_records(&token, cursor.value()).await {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(failure = %FailureKind::SourceRead, error = %e, "source read failed; tick aborted");
                report.record_failure(FailureKind::SourceRead);
                return report;
            }
        };
        report.records_read = batch.records.len();

        if self.config.cursor_advance == CursorAdvance::BeforeEvaluation {
            cursor.advance_to(batch.last_row_index).await;
        }

        for record in &batch.records {
            self.limiter.acquire().await;
            let outcome = self.evaluator.try_evaluate(record).await;
            self.limiter.release().await;

            match outcome {
                Ok(result) => {
                    report.evaluated += 1;
                    tracing::info!(row_index = record.row_index, decision = %result.decision, "candidate evaluated");

                    // Re-resolve: a paced batch can outlive the access token.
                    let sink_token = match self.refresher.get_valid_token(account).await {
                        Ok(t) => t,
                        Err(e) => {
                            tracing::warn!(failure = %FailureKind::Auth, error = %e, "identity lookup failed; reusing tick token");
                            token.clone()
                        }
                    };
                    match self.writer.append(&sink_token, &result).await {
                        Ok(()) => report.appended += 1,
                        Err(e) => {
                            tracing::error!(
                                row_index = record.row_index,
                                failure = %FailureKind::SinkWrite,
                                error = %e,
                                "append failed; result lost"
                            );
                            report.record_failure(FailureKind::SinkWrite);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        row_index = record.row_index,
                        failure = %e.kind(),
                        error = %e,
                        "candidate skipped"
                    );
                    report.record_failure(e.kind());
                }
            }

            if self.config.cursor_advance == CursorAdvance::AfterEachRecord {
                cursor.advance_to(record.row_index).await;
            }
        }

        // Both policies finish a fully handled batch at the read's last row.
        report.cursor_after = cursor.advance_to(batch.last_row_index).await;
        tracing::info!(
            records_read = report.records_read,
            appended = report.appended,
            cursor = report.cursor_after,
            "tick finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::credentials::memory::MemoryCredentialStore;
    use crate::credentials::refresher::DEFAULT_TOKEN_LIFETIME_SECS;
    use crate::cursor::memory::MemoryCursorStorage;
    use crate::cursor::tracker::DEFAULT_CURSOR_KEY;
    use crate::cursor::traits::CursorStorage;
    use crate::evaluation::extract::ExtractionStrategy;
    use crate::evaluation::pacing::{IntervalLimiter, Unpaced};
    use crate::models::{AccountKey, IdentityRecord, Rows, TableLocator};
    use crate::tables::memory::MemoryTables;
    use crate::test_support::{ScriptedExchange, ScriptedInference};
    use crate::Result;

    const ALICE_VERDICT: &str = "Вот оценка:\n{\"candidate_tg\": \"@alice\", \"summary\": \"React, Django, Almaty\", \"decision\": \"Соответствует требованиям\"}";
    const REFUSAL: &str = "I'm sorry, I can't assess this applicant.";

    struct Harness {
        tables: MemoryTables,
        storage: MemoryCursorStorage,
        inference: Arc<ScriptedInference>,
        source: TableLocator,
        target: TableLocator,
    }

    impl Harness {
        async fn new(rows: Rows, script: Vec<Result<String>>) -> Self {
            let tables = MemoryTables::new();
            let source = TableLocator::new("src", "Form Responses 1!A:Z");
            let target = TableLocator::new("dst", "Results!A:C");
            tables.put(&source, rows).await;
            Self {
                tables,
                storage: MemoryCursorStorage::new(),
                inference: Arc::new(ScriptedInference::new(script)),
                source,
                target,
            }
        }

        async fn pipeline(
            &self,
            advance: CursorAdvance,
            limiter: Arc<dyn RateLimiter>,
        ) -> ScreeningPipeline {
            let identity = IdentityRecord::authorized(
                AccountKey::new("acct"),
                "access",
                "refresh",
                chrono::Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS),
                Utc::now(),
            );
            let refresher = TokenRefresher::new(
                Arc::new(MemoryCredentialStore::with_records([identity])),
                Arc::new(ScriptedExchange::succeeding()),
                chrono::Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS),
            )
            .unwrap();
            let cursor =
                CursorTracker::load(Arc::new(self.storage.clone()), DEFAULT_CURSOR_KEY).await;
            ScreeningPipeline::new(
                PipelineConfig {
                    source: self.source.clone(),
                    target: self.target.clone(),
                    account: None,
                    cursor_advance: advance,
                },
                Arc::new(refresher),
                SourceReader::new(Arc::new(self.tables.clone()), self.source.clone()),
                Evaluator::new(self.inference.clone(), ExtractionStrategy::FirstBraces),
                limiter,
                SinkWriter::new(Arc::new(self.tables.clone()), self.target.clone()),
                cursor,
            )
        }
    }

    fn alice_and_bob() -> Rows {
        vec![
            vec!["name".into(), "github".into()],
            vec!["Alice".into(), "alice-gh".into()],
            vec!["Bob".into(), "".into()],
        ]
    }

    #[tokio::test]
    async fn alice_is_appended_bob_is_skipped_cursor_reaches_two() {
        let h = Harness::new(
            alice_and_bob(),
            vec![Ok(ALICE_VERDICT.to_string()), Ok(REFUSAL.to_string())],
        )
        .await;
        let pipeline = h.pipeline(CursorAdvance::BeforeEvaluation, Arc::new(Unpaced)).await;

        let report = pipeline.run_tick().await;

        assert_eq!(report.records_read, 2);
        assert_eq!(report.appended, 1);
        assert_eq!(report.response_parse_failures, 1);
        assert_eq!(report.cursor_after, 2);
        assert_eq!(h.storage.peek(DEFAULT_CURSOR_KEY).await, Some(2));
        assert_eq!(
            h.tables.rows(&h.target).await,
            vec![vec![
                "@alice".to_string(),
                "React, Django, Almaty".to_string(),
                "Соответствует требованиям".to_string()
            ]]
        );
        assert_eq!(
            h.inference.prompts().await,
            vec![
                r#"{"name":"Alice","github":"alice-gh"}"#.to_string(),
                r#"{"name":"Bob","github":""}"#.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn second_tick_without_new_rows_calls_nothing() {
        let h = Harness::new(alice_and_bob(), vec![Ok(ALICE_VERDICT.to_string()), Ok(REFUSAL.to_string())]).await;
        let pipeline = h.pipeline(CursorAdvance::BeforeEvaluation, Arc::new(Unpaced)).await;

        pipeline.run_tick().await;
        let second = pipeline.run_tick().await;

        assert_eq!(second.records_read, 0);
        assert_eq!(second.cursor_before, 2);
        assert_eq!(second.cursor_after, 2);
        assert_eq!(h.inference.prompts().await.len(), 2);
    }

    #[tokio::test]
    async fn cursor_never_decreases_when_source_shrinks() {
        let h = Harness::new(alice_and_bob(), vec![Ok(ALICE_VERDICT.to_string()), Ok(REFUSAL.to_string())]).await;
        let pipeline = h.pipeline(CursorAdvance::BeforeEvaluation, Arc::new(Unpaced)).await;
        pipeline.run_tick().await;

        h.tables.put(&h.source, vec![vec!["name".into()]]).await;
        let report = pipeline.run_tick().await;
        assert_eq!(report.cursor_after, 2);
        assert_eq!(h.storage.peek(DEFAULT_CURSOR_KEY).await, Some(2));
    }

    #[tokio::test]
    async fn source_read_failure_aborts_with_cursor_unchanged() {
        let h = Harness::new(alice_and_bob(), Vec::new()).await;
        h.storage.write_int(DEFAULT_CURSOR_KEY, 1).await.unwrap();
        h.tables.set_fail_reads(true).await;
        let pipeline = h.pipeline(CursorAdvance::BeforeEvaluation, Arc::new(Unpaced)).await;

        let report = pipeline.run_tick().await;
        assert_eq!(report.aborted, Some(FailureKind::SourceRead));
        assert_eq!(report.cursor_after, 1);
        assert_eq!(h.storage.peek(DEFAULT_CURSOR_KEY).await, Some(1));
        assert!(h.inference.prompts().await.is_empty());
    }

    #[tokio::test]
    async fn missing_identity_aborts_as_auth_failure() {
        let h = Harness::new(alice_and_bob(), Vec::new()).await;
        let mut pipeline = h.pipeline(CursorAdvance::BeforeEvaluation, Arc::new(Unpaced)).await;
        pipeline.config.account = Some(AccountKey::new("someone-else"));

        let report = pipeline.run_tick().await;
        assert_eq!(report.aborted, Some(FailureKind::Auth));
        assert_eq!(report.cursor_after, 0);
    }

    #[tokio::test]
    async fn sink_failure_does_not_stop_the_batch() {
        let both_accepted = vec![Ok(ALICE_VERDICT.to_string()), Ok(ALICE_VERDICT.to_string())];
        let h = Harness::new(alice_and_bob(), both_accepted).await;
        h.tables.set_fail_appends(true).await;
        let pipeline = h.pipeline(CursorAdvance::BeforeEvaluation, Arc::new(Unpaced)).await;

        let report = pipeline.run_tick().await;
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.sink_write_failures, 2);
        assert_eq!(report.appended, 0);
        assert_eq!(report.cursor_after, 2);
    }

    #[tokio::test]
    async fn model_failure_skips_only_that_candidate() {
        let script = vec![
            Err(crate::Error::BackendMessage("429".to_string())),
            Ok(ALICE_VERDICT.to_string()),
        ];
        let h = Harness::new(alice_and_bob(), script).await;
        let pipeline = h.pipeline(CursorAdvance::BeforeEvaluation, Arc::new(Unpaced)).await;

        let report = pipeline.run_tick().await;
        assert_eq!(report.model_call_failures, 1);
        assert_eq!(report.appended, 1);
    }

    #[tokio::test]
    async fn after_each_record_ends_at_the_same_cursor() {
        let h = Harness::new(alice_and_bob(), vec![Ok(ALICE_VERDICT.to_string()), Ok(REFUSAL.to_string())]).await;
        let pipeline = h.pipeline(CursorAdvance::AfterEachRecord, Arc::new(Unpaced)).await;

        let report = pipeline.run_tick().await;
        assert_eq!(report.cursor_after, 2);
        assert_eq!(h.storage.peek(DEFAULT_CURSOR_KEY).await, Some(2));
        assert_eq!(report.appended, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn model_calls_are_spaced_by_the_pacing_delay() {
        let rows: Rows = std::iter::once(vec!["name".to_string()])
            .chain((0..4).map(|i| vec![format!("candidate-{i}")]))
            .collect();
        let script = (0..4).map(|_| Ok(REFUSAL.to_string())).collect();
        let h = Harness::new(rows, script).await;
        let delay = Duration::from_secs(20);
        let pipeline = h
            .pipeline(CursorAdvance::BeforeEvaluation, Arc::new(IntervalLimiter::new(delay)))
            .await;

        pipeline.run_tick().await;

        let times = h.inference.call_times().await;
        assert_eq!(times.len(), 4);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= delay);
        }
    }
}
