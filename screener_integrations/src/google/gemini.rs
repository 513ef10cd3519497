//! Gemini `generateContent` client.
//!
//! Configured once with the rubric as system instruction and every adjustable
//! safety category set to `BLOCK_NONE`, so rubric text about location or
//! background is never filtered.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use screener_core::{Error, InferenceClient, Result};
use serde::{Deserialize, Serialize};

use crate::http::{build_client, ensure_success};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    system_instruction: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        system_instruction: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(120))?,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            system_instruction: system_instruction.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::backend(format!("parse gemini base url {}", self.base_url), e))?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidInput(format!("gemini base url {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["v1beta", "models"])
            .push(&format!("{}:generateContent", self.model));
        Ok(url)
    }

    fn request<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![TextPart {
                    text: &self.system_instruction,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![TextPart { text: prompt }],
            }],
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        }
    }
}

/// Concatenated text of the first candidate.
fn response_text(resp: GenerateResponse) -> Result<String> {
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(Error::InvalidResponse(format!("prompt blocked: {reason}")));
    }
    let Some(candidate) = resp.candidates.into_iter().next() else {
        return Err(Error::InvalidResponse("response has no candidates".to_string()));
    };
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(Error::InvalidResponse(format!(
            "candidate has no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}

#[async_trait]
impl InferenceClient for GeminiClient {
    #[tracing::instrument(level = "debug", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let resp = self
            .client
            .post(self.endpoint()?)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(Error::backend_reqwest)?;
        let resp = ensure_success(resp, "gemini generateContent").await?;
        let body: GenerateResponse = resp.json().await.map_err(Error::backend_reqwest)?;
        response_text(body)
    }
}
