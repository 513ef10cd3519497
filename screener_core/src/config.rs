use std::path::PathBuf;
use std::time::Duration;

use crate::credentials::refresher::DEFAULT_TOKEN_LIFETIME_SECS;
use crate::evaluation::extract::ExtractionStrategy;
use crate::evaluation::pacing::DEFAULT_PACING;
use crate::models::{AccountKey, TableLocator};
use crate::o11y::{redact, LogFormat, O11yConfig};
use crate::pipeline::models::CursorAdvance;
use crate::scheduler::cron::CronExpr;
use crate::{Error, Result};

pub const DEFAULT_DATA_DIR: &str = ".screener";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_TICK_CRON: &str = "* * * * *";
pub const DEFAULT_SWEEP_CRON: &str = "0 * * * *";
pub const CREDENTIALS_DB_FILE: &str = "credentials.db";

/// Google OAuth client used for the refresh-token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .finish()
    }
}

/// Process configuration, read from the environment.
///
/// Values only some commands need (API credentials, table locators) are optional
/// here and checked by the `require_*` accessors, so `config` and `cursor` work
/// without them.
#[derive(Clone)]
pub struct ScreenerConfig {
    pub oauth: Option<OAuthClientConfig>,
    pub gemini_api_key: Option<String>,
    pub source: Option<TableLocator>,
    pub target: Option<TableLocator>,
    pub data_dir: PathBuf,
    pub account: Option<AccountKey>,
    pub gemini_model: String,
    pub rubric_path: Option<PathBuf>,
    pub pacing: Duration,
    pub token_lifetime: chrono::Duration,
    pub tick_cron: CronExpr,
    pub sweep_cron: CronExpr,
    pub cursor_advance: CursorAdvance,
    pub extraction: ExtractionStrategy,
    pub log_format: LogFormat,
}

impl ScreenerConfig {
    #[tracing::instrument(level = "debug")]
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let oauth = match (get("GOOGLE_CLIENT_ID"), get("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(OAuthClientConfig {
                client_id,
                client_secret,
            }),
            (None, None) => None,
            _ => {
                return Err(Error::InvalidInput(
                    "GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET must be set together".to_string(),
                ))
            }
        };

        let source = table_locator(get("SPREADSHEET_ID"), get("RANGE"), "SPREADSHEET_ID", "RANGE")?;
        let target = table_locator(
            get("TARGET_SPREADSHEET_ID"),
            get("TARGET_RANGE"),
            "TARGET_SPREADSHEET_ID",
            "TARGET_RANGE",
        )?;

        let pacing_ms = parse_or("SCREENER_PACING_MS", get("SCREENER_PACING_MS"), || {
            DEFAULT_PACING.as_millis() as u64
        })?;
        let lifetime_secs = parse_or(
            "SCREENER_TOKEN_LIFETIME_SECS",
            get("SCREENER_TOKEN_LIFETIME_SECS"),
            || DEFAULT_TOKEN_LIFETIME_SECS,
        )?;

        let cron = |name: &str, default: &str| -> Result<CronExpr> {
            let raw = get(name).unwrap_or_else(|| default.to_string());
            CronExpr::parse(&raw).map_err(|e| Error::InvalidInput(format!("{name}: {e}")))
        };

        let cursor_advance = match get("SCREENER_CURSOR_ADVANCE") {
            Some(v) => CursorAdvance::parse(&v).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "invalid SCREENER_CURSOR_ADVANCE: {v} (expected before_evaluation or after_each_record)"
                ))
            })?,
            None => CursorAdvance::default(),
        };
        let extraction = match get("SCREENER_EXTRACTION") {
            Some(v) => ExtractionStrategy::parse(&v).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "invalid SCREENER_EXTRACTION: {v} (expected first_braces or balanced)"
                ))
            })?,
            None => ExtractionStrategy::default(),
        };
        let log_format = match get("SCREENER_LOG_FORMAT") {
            Some(v) => LogFormat::parse(&v)
                .ok_or_else(|| Error::InvalidInput(format!("invalid SCREENER_LOG_FORMAT: {v}")))?,
            None => LogFormat::Json,
        };

        let cfg = Self {
            oauth,
            gemini_api_key: get("GEMINI_API_KEY"),
            source,
            target,
            data_dir: get("SCREENER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            account: get("SCREENER_ACCOUNT").map(AccountKey::new),
            gemini_model: get("SCREENER_GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            rubric_path: get("SCREENER_RUBRIC_PATH").map(PathBuf::from),
            pacing: Duration::from_millis(pacing_ms),
            token_lifetime: chrono::Duration::seconds(lifetime_secs),
            tick_cron: cron("SCREENER_TICK_CRON", DEFAULT_TICK_CRON)?,
            sweep_cron: cron("SCREENER_SWEEP_CRON", DEFAULT_SWEEP_CRON)?,
            cursor_advance,
            extraction,
            log_format,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn validate(&self) -> Result<()> {
        if self.token_lifetime <= chrono::Duration::zero() {
            return Err(Error::InvalidInput(
                "SCREENER_TOKEN_LIFETIME_SECS must be > 0".to_string(),
            ));
        }
        if self.gemini_model.contains('/') {
            return Err(Error::InvalidInput(format!(
                "SCREENER_GEMINI_MODEL must be a bare model name, got {}",
                self.gemini_model
            )));
        }
        Ok(())
    }

    pub fn credentials_db_path(&self) -> PathBuf {
        self.data_dir.join(CREDENTIALS_DB_FILE)
    }

    pub fn cursor_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    pub fn require_oauth(&self) -> Result<&OAuthClientConfig> {
        self.oauth.as_ref().ok_or_else(|| {
            Error::InvalidInput("GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET are required".to_string())
        })
    }

    pub fn require_gemini_api_key(&self) -> Result<&str> {
        self.gemini_api_key
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("GEMINI_API_KEY is required".to_string()))
    }

    pub fn require_source(&self) -> Result<&TableLocator> {
        self.source.as_ref().ok_or_else(|| {
            Error::InvalidInput("SPREADSHEET_ID and RANGE are required".to_string())
        })
    }

    pub fn require_target(&self) -> Result<&TableLocator> {
        self.target.as_ref().ok_or_else(|| {
            Error::InvalidInput("TARGET_SPREADSHEET_ID and TARGET_RANGE are required".to_string())
        })
    }

    /// Logging setup derived from `SCREENER_LOG_FORMAT`.
    pub fn o11y(&self) -> O11yConfig {
        O11yConfig::new(self.log_format)
    }

    /// Effective configuration with every secret masked.
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "google_client_id": self.oauth.as_ref().map(|o| o.client_id.clone()),
            "google_client_secret": self.oauth.as_ref().map(|o| redact(&o.client_secret)),
            "gemini_api_key": self.gemini_api_key.as_deref().map(redact),
            "source": self.source.as_ref().map(ToString::to_string),
            "target": self.target.as_ref().map(ToString::to_string),
            "data_dir": self.data_dir.display().to_string(),
            "account": self.account.as_ref().map(AccountKey::as_str),
            "gemini_model": self.gemini_model,
            "rubric_path": self.rubric_path.as_ref().map(|p| p.display().to_string()),
            "pacing_ms": self.pacing.as_millis() as u64,
            "token_lifetime_secs": self.token_lifetime.num_seconds(),
            "tick_cron": self.tick_cron.to_string(),
            "sweep_cron": self.sweep_cron.to_string(),
            "cursor_advance": self.cursor_advance.as_str(),
            "extraction": format!("{:?}", self.extraction),
            "log_format": format!("{:?}", self.log_format),
        })
    }
}

impl std::fmt::Debug for ScreenerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted().to_string())
    }
}

fn table_locator(
    id: Option<String>,
    range: Option<String>,
    id_var: &str,
    range_var: &str,
) -> Result<Option<TableLocator>> {
    match (id, range) {
        (Some(id), Some(range)) => Ok(Some(TableLocator::new(id, range))),
        (None, None) => Ok(None),
        _ => Err(Error::InvalidInput(format!(
            "{id_var} and {range_var} must be set together"
        ))),
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &str,
    raw: Option<String>,
    default: impl FnOnce() -> T,
) -> Result<T> {
    match raw {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid {name}: {v}"))),
        None => Ok(default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = ScreenerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from(".screener"));
        assert_eq!(cfg.credentials_db_path(), PathBuf::from(".screener/credentials.db"));
        assert_eq!(cfg.gemini_model, "gemini-1.5-pro");
        assert_eq!(cfg.pacing, Duration::from_secs(20));
        assert_eq!(cfg.token_lifetime, chrono::Duration::seconds(3600));
        assert_eq!(cfg.tick_cron.to_string(), "* * * * *");
        assert_eq!(cfg.sweep_cron.to_string(), "0 * * * *");
        assert_eq!(cfg.cursor_advance, CursorAdvance::BeforeEvaluation);
        assert_eq!(cfg.extraction, ExtractionStrategy::Balanced);
        assert_eq!(cfg.o11y().format, LogFormat::Json);
        assert!(cfg.require_source().is_err());
        assert!(cfg.require_oauth().is_err());
    }

    #[test]
    fn full_environment_is_read() {
        let cfg = ScreenerConfig::from_lookup(lookup(&[
            ("GOOGLE_CLIENT_ID", "id.apps.googleusercontent.com"),
            ("GOOGLE_CLIENT_SECRET", "GOCSPX-abcdefghijkl"),
            ("GEMINI_API_KEY", "AIzaSyExampleKey123"),
            ("SPREADSHEET_ID", "src-id"),
            ("RANGE", "Form Responses 1!A:Z"),
            ("TARGET_SPREADSHEET_ID", "dst-id"),
            ("TARGET_RANGE", "Results!A:C"),
            ("SCREENER_ACCOUNT", "1234567890"),
            ("SCREENER_PACING_MS", "500"),
            ("SCREENER_CURSOR_ADVANCE", "after_each_record"),
            ("SCREENER_EXTRACTION", "first_braces"),
            ("SCREENER_TICK_CRON", "*/5 * * * *"),
            ("SCREENER_LOG_FORMAT", "pretty"),
        ]))
        .unwrap();

        assert_eq!(cfg.require_source().unwrap().to_string(), "src-id!Form Responses 1!A:Z");
        assert_eq!(cfg.require_target().unwrap().spreadsheet_id, "dst-id");
        assert_eq!(cfg.account, Some(AccountKey::new("1234567890")));
        assert_eq!(cfg.pacing, Duration::from_millis(500));
        assert_eq!(cfg.cursor_advance, CursorAdvance::AfterEachRecord);
        assert_eq!(cfg.extraction, ExtractionStrategy::FirstBraces);
        assert_eq!(cfg.require_gemini_api_key().unwrap(), "AIzaSyExampleKey123");
        assert_eq!(cfg.o11y().format, LogFormat::Pretty);
        assert_eq!(cfg.o11y().default_filter, "info");
    }

    #[test]
    fn invalid_values_name_the_variable() {
        for (name, value) in [
            ("SCREENER_PACING_MS", "soon"),
            ("SCREENER_TOKEN_LIFETIME_SECS", "0"),
            ("SCREENER_TICK_CRON", "every minute"),
            ("SCREENER_CURSOR_ADVANCE", "sometimes"),
            ("SCREENER_EXTRACTION", "regex"),
            ("SCREENER_LOG_FORMAT", "xml"),
        ] {
            let err = ScreenerConfig::from_lookup(lookup(&[(name, value)])).unwrap_err();
            assert!(err.to_string().contains(name), "{name}: {err}");
        }
    }

    #[test]
    fn half_configured_pairs_are_rejected() {
        assert!(ScreenerConfig::from_lookup(lookup(&[("SPREADSHEET_ID", "x")])).is_err());
        assert!(ScreenerConfig::from_lookup(lookup(&[("GOOGLE_CLIENT_ID", "x")])).is_err());
    }

    #[test]
    fn redacted_view_hides_secrets() {
        let cfg = ScreenerConfig::from_lookup(lookup(&[
            ("GOOGLE_CLIENT_ID", "client"),
            ("GOOGLE_CLIENT_SECRET", "GOCSPX-super-secret-value"),
            ("GEMINI_API_KEY", "AIzaSy-super-secret-key"),
        ]))
        .unwrap();
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("client"));
    }
}
