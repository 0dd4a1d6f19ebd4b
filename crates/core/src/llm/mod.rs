pub mod error;
pub mod gemini;
pub mod json;
pub mod prompts;

use crate::llm::error::ServiceError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
}

/// Sampling parameters sent with each generation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    pub const SCORE: Self = Self {
        temperature: 0.3,
        max_output_tokens: 8192,
    };

    pub const AML: Self = Self {
        temperature: 0.2,
        max_output_tokens: 1024,
    };
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Sends one prompt and returns the model's raw text. One attempt only.
    async fn generate_text(
        &self,
        prompt: &str,
        config: GenerationConfig,
    ) -> Result<String, ServiceError>;
}
