//! Screener core library: incremental candidate screening over a growing source
//! table, paced model evaluation, and credential freshness.

pub mod config;
pub mod credentials;
pub mod cursor;
pub mod error;
pub mod evaluation;
pub mod models;
pub mod o11y;
pub mod pipeline;
pub mod scheduler;
pub mod tables;

mod test_support;

pub use config::ScreenerConfig;
pub use credentials::refresher::{is_token_valid, SweepReport, TokenRefresher};
pub use credentials::traits::{CredentialStore, ExchangedToken, TokenExchange};
pub use cursor::traits::CursorStorage;
pub use cursor::tracker::{CursorTracker, DEFAULT_CURSOR_KEY};
pub use error::{Error, Result};
pub use evaluation::engine::Evaluator;
pub use evaluation::extract::ExtractionStrategy;
pub use evaluation::pacing::{IntervalLimiter, RateLimiter};
pub use evaluation::traits::InferenceClient;
pub use models::{
    AccountKey, CandidateRecord, Decision, EvaluationResult, IdentityRecord, Rows, TableLocator,
};
pub use pipeline::engine::ScreeningPipeline;
pub use pipeline::models::{CursorAdvance, FailureKind, PipelineConfig, TickReport};
pub use scheduler::runner::{FireOutcome, ScheduleConfig, Scheduler};
pub use tables::traits::{TableSink, TableSource};
