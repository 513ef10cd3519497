//! Wiring of concrete backends: SQLite identities, file cursor, Google APIs.

use std::sync::Arc;

use screener_core::credentials::sqlite::SqliteCredentialStore;
use screener_core::cursor::file::FileCursorStorage;
use screener_core::evaluation::rubric::load_rubric;
use screener_core::tables::reader::SourceReader;
use screener_core::tables::writer::SinkWriter;
use screener_core::{
    CredentialStore, CursorStorage, CursorTracker, Evaluator, IntervalLimiter, PipelineConfig,
    ScheduleConfig, Scheduler, ScreenerConfig, ScreeningPipeline, TokenRefresher,
    DEFAULT_CURSOR_KEY,
};
use screener_integrations::google::gemini::GeminiClient;
use screener_integrations::google::oauth::GoogleOAuthClient;
use screener_integrations::google::sheets::GoogleSheetsClient;

pub async fn credential_store(cfg: &ScreenerConfig) -> anyhow::Result<Arc<dyn CredentialStore>> {
    let store = SqliteCredentialStore::new(cfg.credentials_db_path()).await?;
    Ok(Arc::new(store))
}

pub fn cursor_storage(cfg: &ScreenerConfig) -> Arc<dyn CursorStorage> {
    Arc::new(FileCursorStorage::new(cfg.cursor_dir()))
}

pub fn refresher(
    cfg: &ScreenerConfig,
    store: Arc<dyn CredentialStore>,
) -> anyhow::Result<Arc<TokenRefresher>> {
    let oauth = cfg.require_oauth()?;
    let exchange = GoogleOAuthClient::new(&oauth.client_id, &oauth.client_secret)?;
    Ok(Arc::new(TokenRefresher::new(
        store,
        Arc::new(exchange),
        cfg.token_lifetime,
    )?))
}

#[tracing::instrument(level = "info", skip_all)]
pub async fn pipeline(
    cfg: &ScreenerConfig,
    refresher: Arc<TokenRefresher>,
) -> anyhow::Result<Arc<ScreeningPipeline>> {
    let source = cfg.require_source()?.clone();
    let target = cfg.require_target()?.clone();

    let rubric = load_rubric(cfg.rubric_path.as_deref()).await?;
    let gemini = GeminiClient::new(cfg.require_gemini_api_key()?, &cfg.gemini_model, rubric)?;
    let sheets = Arc::new(GoogleSheetsClient::new()?);

    let cursor = CursorTracker::load(cursor_storage(cfg), DEFAULT_CURSOR_KEY).await;
    tracing::info!(
        source = %source,
        target = %target,
        model = %cfg.gemini_model,
        cursor = cursor.value(),
        "pipeline assembled"
    );

    Ok(Arc::new(ScreeningPipeline::new(
        PipelineConfig {
            source: source.clone(),
            target: target.clone(),
            account: cfg.account.clone(),
            cursor_advance: cfg.cursor_advance,
        },
        refresher,
        SourceReader::new(sheets.clone(), source),
        Evaluator::new(Arc::new(gemini), cfg.extraction),
        Arc::new(IntervalLimiter::new(cfg.pacing)),
        SinkWriter::new(sheets, target),
        cursor,
    )))
}

pub async fn scheduler(cfg: &ScreenerConfig) -> anyhow::Result<Scheduler> {
    let store = credential_store(cfg).await?;
    let refresher = refresher(cfg, store)?;
    let pipeline = pipeline(cfg, refresher.clone()).await?;
    Ok(Scheduler::new(
        pipeline,
        refresher,
        ScheduleConfig {
            tick: cfg.tick_cron.clone(),
            sweep: cfg.sweep_cron.clone(),
        },
    ))
}
