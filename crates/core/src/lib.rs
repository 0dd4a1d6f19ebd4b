pub mod domain;
pub mod ingest;
pub mod llm;
pub mod news;
pub mod pipeline;
pub mod review;

#[cfg(test)]
pub(crate) mod test_support;

pub mod config {
    use anyhow::Context;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    const DEFAULT_WORKBOOK_PATH: &str = "授信標準.xlsx";
    const DEFAULT_COMPANIES_PATH: &str = "companies.json";

    /// Credentials the review flows need. Absence is a "not configured" state, never an error.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    pub enum SecretName {
        GeminiApiKey,
        NewsApiKey,
    }

    impl SecretName {
        pub fn env_var(self) -> &'static str {
            match self {
                SecretName::GeminiApiKey => "GEMINI_API_KEY",
                SecretName::NewsApiKey => "NEWS_API_KEY",
            }
        }
    }

    /// Source of API credentials. The pipeline never assumes a storage medium.
    pub trait SecretsProvider: Send + Sync {
        fn secret(&self, name: SecretName) -> Option<String>;
    }

    /// In-memory secrets, for embedding and tests.
    #[derive(Debug, Clone, Default)]
    pub struct StaticSecrets {
        values: BTreeMap<SecretName, String>,
    }

    impl StaticSecrets {
        pub fn with(mut self, name: SecretName, value: impl Into<String>) -> Self {
            self.values.insert(name, value.into());
            self
        }
    }

    impl SecretsProvider for StaticSecrets {
        fn secret(&self, name: SecretName) -> Option<String> {
            self.values.get(&name).and_then(|v| non_blank(Some(v.clone())))
        }
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub gemini_api_key: Option<String>,
        pub gemini_api_url: Option<String>,
        pub news_api_key: Option<String>,
        pub news_api_url: Option<String>,
        pub workbook_path: Option<String>,
        pub companies_path: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                gemini_api_key: env_non_blank("GEMINI_API_KEY"),
                gemini_api_url: env_non_blank("GEMINI_API_URL"),
                news_api_key: env_non_blank("NEWS_API_KEY"),
                news_api_url: env_non_blank("NEWS_API_URL"),
                workbook_path: env_non_blank("CREDITDESK_WORKBOOK"),
                companies_path: env_non_blank("CREDITDESK_COMPANIES"),
                sentry_dsn: env_non_blank("SENTRY_DSN"),
            })
        }

        pub fn workbook_path(&self) -> PathBuf {
            PathBuf::from(
                self.workbook_path
                    .as_deref()
                    .unwrap_or(DEFAULT_WORKBOOK_PATH),
            )
        }

        pub fn companies_path(&self) -> PathBuf {
            PathBuf::from(
                self.companies_path
                    .as_deref()
                    .unwrap_or(DEFAULT_COMPANIES_PATH),
            )
        }

        pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
            self.gemini_api_key
                .as_deref()
                .context("GEMINI_API_KEY is required")
        }

        pub fn require_news_api_key(&self) -> anyhow::Result<&str> {
            self.news_api_key
                .as_deref()
                .context("NEWS_API_KEY is required")
        }
    }

    impl SecretsProvider for Settings {
        fn secret(&self, name: SecretName) -> Option<String> {
            match name {
                SecretName::GeminiApiKey => self.gemini_api_key.clone(),
                SecretName::NewsApiKey => self.news_api_key.clone(),
            }
        }
    }

    /// Reads a numeric tuning knob from the environment, falling back to `default`.
    pub fn env_u64(key: &str, default: u64) -> u64 {
        std::env::var(key)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(default)
    }

    fn env_non_blank(key: &str) -> Option<String> {
        non_blank(std::env::var(key).ok())
    }

    fn non_blank(v: Option<String>) -> Option<String> {
        v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    }

}
