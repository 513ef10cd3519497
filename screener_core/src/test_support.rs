#![cfg(test)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::credentials::traits::{ExchangedToken, TokenExchange};
use crate::evaluation::traits::InferenceClient;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy)]
enum ExchangeMode {
    Succeed,
    Rotate,
    Fail,
}

/// Token exchange with a fixed outcome that counts its calls.
pub(crate) struct ScriptedExchange {
    mode: ExchangeMode,
    calls: AtomicUsize,
}

impl ScriptedExchange {
    fn with_mode(mode: ExchangeMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn succeeding() -> Self {
        Self::with_mode(ExchangeMode::Succeed)
    }

    pub(crate) fn rotating() -> Self {
        Self::with_mode(ExchangeMode::Rotate)
    }

    pub(crate) fn failing() -> Self {
        Self::with_mode(ExchangeMode::Fail)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenExchange for ScriptedExchange {
    async fn exchange_refresh_token(&self, _refresh_token: &str) -> Result<ExchangedToken> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.mode {
            ExchangeMode::Succeed => Ok(ExchangedToken {
                access_token: format!("fresh-access-{n}"),
                refresh_token: None,
            }),
            ExchangeMode::Rotate => Ok(ExchangedToken {
                access_token: format!("fresh-access-{n}"),
                refresh_token: Some(format!("rotated-refresh-{n}")),
            }),
            ExchangeMode::Fail => Err(Error::Unauthorized("invalid_grant".to_string())),
        }
    }
}

/// Inference client that replays queued responses in order and records each prompt
/// with the (tokio) instant it arrived. An exhausted script answers with an error.
pub(crate) struct ScriptedInference {
    script: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedInference {
    pub(crate) fn new(script: impl IntoIterator<Item = Result<String>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .await
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub(crate) async fn call_times(&self) -> Vec<Instant> {
        self.prompts.lock().await.iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl InferenceClient for ScriptedInference {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .await
            .push((prompt.to_string(), Instant::now()));
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(Error::BackendMessage("inference script exhausted".to_string())))
    }
}
