use crate::Result;
use async_trait::async_trait;

/// Inference endpoint, configured once with the rubric as system instruction and a
/// permissive safety-filter configuration.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Submit `prompt` as the sole user input and return the response text.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
