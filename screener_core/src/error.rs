use std::error::Error as StdError;

/// Failure of a screening operation.
///
/// `Unauthorized` from the token exchange or a Sheets call means the account needs
/// a fresh login. `Backend` wraps I/O from `credentials.db`, the cursor file or an
/// HTTP transport with its source chain intact.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Bad configuration, CLI argument or table shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No stored identity (or other record) under the requested key.
    #[error("not found: {0}")]
    NotFound(String),

    /// Refresh token revoked, or Google answered 401/403.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// An upstream service answered, but the payload was not what we expected.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("backend error: {0}")]
    BackendMessage(String),
}

impl Error {
    #[tracing::instrument(level = "debug", name = "screener.error.backend", skip(source))]
    pub fn backend(
        context: impl Into<String> + std::fmt::Debug,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Transport-level failure of a Google API call (connect, timeout, body decode).
    pub fn backend_reqwest(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Backend {
            context: "reqwest".into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
