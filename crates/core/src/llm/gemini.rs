use crate::config::{env_u64, SecretName, SecretsProvider, Settings};
use crate::llm::error::ServiceError;
use crate::llm::{GenerationConfig, LlmClient, Provider};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "gemini";
const DEFAULT_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-flash-latest:generateContent";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, api_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            http,
            api_key,
            api_url,
        })
    }

    /// `Ok(None)` when no API key is configured.
    pub fn from_secrets(
        settings: &Settings,
        secrets: &dyn SecretsProvider,
    ) -> anyhow::Result<Option<Self>> {
        let Some(api_key) = secrets.secret(SecretName::GeminiApiKey) else {
            return Ok(None);
        };
        let api_url = settings
            .gemini_api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let timeout = Duration::from_secs(env_u64("GEMINI_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS));
        Self::new(api_key, api_url, timeout).map(Some)
    }

    fn request_body(prompt: &str, config: GenerationConfig) -> GenerateContentRequest<'_> {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: config,
        }
    }

    fn response_text(res: GenerateContentResponse) -> Result<String, ServiceError> {
        res.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| ServiceError::parse(SERVICE, "response has no candidate text"))
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate_text(
        &self,
        prompt: &str,
        config: GenerationConfig,
    ) -> Result<String, ServiceError> {
        tracing::debug!(
            prompt_chars = prompt.chars().count(),
            max_output_tokens = config.max_output_tokens,
            "sending Gemini request"
        );

        let res = self
            .http
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(prompt, config))
            .send()
            .await
            .map_err(|e| ServiceError::request(SERVICE, e))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| ServiceError::request(SERVICE, e))?;
        let text = ServiceError::check_status(SERVICE, status, text)?;

        let parsed = serde_json::from_str::<GenerateContentResponse>(&text)
            .map_err(|e| ServiceError::parse(SERVICE, e))?;
        Self::response_text(parsed)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticSecrets;
    use crate::llm::error::FailureKind;
    use crate::test_support::stub_server;
    use axum::http::StatusCode;
    use serde_json::json;

    fn settings() -> Settings {
        Settings {
            gemini_api_key: None,
            gemini_api_url: Some("http://localhost:9/generate".to_string()),
            news_api_key: None,
            news_api_url: None,
            workbook_path: None,
            companies_path: None,
            sentry_dsn: None,
        }
    }

    #[test]
    fn request_body_matches_generate_content_shape() {
        let body = serde_json::to_value(GeminiClient::request_body("hi", GenerationConfig::SCORE))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{"parts": [{"text": "hi"}]}],
                "generationConfig": {"temperature": 0.3, "maxOutputTokens": 8192}
            })
        );
    }

    #[test]
    fn reads_first_candidate_text() {
        let res: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"parts": [{"text": "{\"a\":1}"}], "role": "model"}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(GeminiClient::response_text(res).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn empty_candidates_is_a_parse_error() {
        let res: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        let err = GeminiClient::response_text(res).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Parse);
    }

    #[test]
    fn missing_key_means_not_configured() {
        let client = GeminiClient::from_secrets(&settings(), &StaticSecrets::default()).unwrap();
        assert!(client.is_none());

        let secrets = StaticSecrets::default().with(SecretName::GeminiApiKey, "k");
        let client = GeminiClient::from_secrets(&settings(), &secrets)
            .unwrap()
            .unwrap();
        assert_eq!(client.api_url, "http://localhost:9/generate");
        assert_eq!(client.provider(), Provider::Gemini);
    }

    fn client(api_url: String) -> GeminiClient {
        GeminiClient::new("k".to_string(), api_url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn error_status_is_a_transport_failure() {
        let url = stub_server(StatusCode::SERVICE_UNAVAILABLE, "overloaded").await;
        let err = client(url)
            .generate_text("hi", GenerationConfig::SCORE)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Transport);
        assert!(
            matches!(err, ServiceError::Transport { status: 503, ref body, .. } if body == "overloaded")
        );
    }

    #[tokio::test]
    async fn success_status_returns_candidate_text() {
        let url = stub_server(
            StatusCode::OK,
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"ok\":true}"}]}}]}"#,
        )
        .await;
        let text = client(url)
            .generate_text("hi", GenerationConfig::AML)
            .await
            .unwrap();
        assert_eq!(text, r#"{"ok":true}"#);
    }
}
