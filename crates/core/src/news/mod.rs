//! Adverse-media search against the GNews search API.

use crate::config::{env_u64, SecretName, SecretsProvider, Settings};
use crate::llm::error::ServiceError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "gnews";
const DEFAULT_API_URL: &str = "https://gnews.io/api/v4/search";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const LANGUAGE: &str = "zh";
const MAX_RESULTS: &str = "10";

const RISK_KEYWORDS: [&str; 6] = [
    "洗錢",
    "非法交易",
    "詐欺",
    "金融犯罪",
    "money laundering",
    "fraud",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[async_trait::async_trait]
pub trait NewsClient: Send + Sync {
    /// Articles matching the company name combined with the financial-crime keywords.
    async fn search_adverse_media(&self, company_name: &str) -> Result<Vec<Article>, ServiceError>;
}

/// `{name} (洗錢 OR ... OR fraud)`
pub fn adverse_media_query(company_name: &str) -> String {
    format!("{company_name} ({})", RISK_KEYWORDS.join(" OR "))
}

#[derive(Debug, Clone)]
pub struct GNewsClient {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl GNewsClient {
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
        let Some(api_key) = secrets.secret(SecretName::NewsApiKey) else {
            return Ok(None);
        };
        let api_url = settings
            .news_api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let timeout = Duration::from_secs(env_u64("NEWS_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS));
        Self::new(api_key, api_url, timeout).map(Some)
    }

    fn decode(body: &str) -> Result<Vec<Article>, ServiceError> {
        let parsed = serde_json::from_str::<SearchResponse>(body)
            .map_err(|e| ServiceError::parse(SERVICE, e))?;
        Ok(parsed.articles)
    }
}

#[async_trait::async_trait]
impl NewsClient for GNewsClient {
    async fn search_adverse_media(&self, company_name: &str) -> Result<Vec<Article>, ServiceError> {
        let query = adverse_media_query(company_name);
        let res = self
            .http
            .get(&self.api_url)
            .query(&[
                ("q", query.as_str()),
                ("lang", LANGUAGE),
                ("max", MAX_RESULTS),
                ("token", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::request(SERVICE, e))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| ServiceError::request(SERVICE, e))?;
        let text = ServiceError::check_status(SERVICE, status, text)?;

        let articles = Self::decode(&text)?;
        tracing::debug!(company = company_name, articles = articles.len(), "news search done");
        Ok(articles)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<Article>,
}
