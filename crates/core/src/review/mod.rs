//! One analyst's review session: company selection, charts, and the two AI panels.
//!
//! Every selection bumps the session generation. Panel results are tagged with the generation
//! they were requested under and dropped if the analyst has moved on since.

use crate::config::{SecretsProvider, Settings};
use crate::domain::aml::AmlResult;
use crate::domain::company::Company;
use crate::domain::contract::{LlmAmlResult, LlmScoreResult};
use crate::domain::record::FinancialRecord;
use crate::domain::score::ScoreResult;
use crate::ingest::Dataset;
use crate::llm::error::{FailureKind, ServiceError};
use crate::llm::gemini::GeminiClient;
use crate::llm::json::parse_json_object;
use crate::llm::prompts::{build_aml_prompt, build_score_prompt, ScoreSummary};
use crate::llm::{GenerationConfig, LlmClient};
use crate::news::{GNewsClient, NewsClient};
use crate::pipeline::aggregate::{AggregateSnapshot, MissingPolicy};
use crate::pipeline::charts::{build_charts, ChartSpec};
use crate::pipeline::filter::{select_company, NoData};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

const SCORE_SERVICE: &str = "scoring";
const AML_SERVICE: &str = "aml";

/// Selection failures. Both are recoverable by picking another company.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("unknown company: {0}")]
    UnknownCompany(String),
    #[error(transparent)]
    NoData(#[from] NoData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PanelState<T> {
    Idle,
    Loading,
    /// A credential is missing. Not an error; the panel is simply disabled.
    NotConfigured {
        message: String,
    },
    Ready {
        result: T,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

impl<T> Default for PanelState<T> {
    fn default() -> Self {
        PanelState::Idle
    }
}

impl<T> PanelState<T> {
    pub fn failed(err: &ServiceError) -> Self {
        PanelState::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, PanelState::Ready { .. })
    }
}

/// Explicit session state. Handlers take the current value and hand back the next one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewSession {
    pub generation: u64,
    pub company: Option<Company>,
    pub records: Vec<FinancialRecord>,
    pub charts: Vec<ChartSpec>,
    pub snapshot: Option<AggregateSnapshot>,
    pub score: PanelState<ScoreResult>,
    pub aml: PanelState<AmlResult>,
    pub selected_at: Option<DateTime<Utc>>,
}

/// What the panel requests need to know about one selection.
#[derive(Debug, Clone)]
pub struct SelectionTicket {
    pub generation: u64,
    pub company: Company,
    /// Missing metrics counted as zero.
    pub snapshot: AggregateSnapshot,
}

impl ReviewSession {
    /// Builds the session for a new selection. On error the current session stays as it is.
    pub fn select(
        &self,
        dataset: &Dataset,
        company_id: &str,
    ) -> Result<(ReviewSession, SelectionTicket), ReviewError> {
        let company = dataset
            .directory
            .get(company_id)
            .cloned()
            .ok_or_else(|| ReviewError::UnknownCompany(company_id.trim().to_string()))?;
        let records = select_company(&dataset.records, &company.id)?;

        let generation = self.generation + 1;
        let charts = build_charts(&records);
        let snapshot = AggregateSnapshot::compute(&records, MissingPolicy::Zero);
        tracing::info!(
            generation,
            company = %company.id,
            years = records.len(),
            "company selected"
        );

        let next = ReviewSession {
            generation,
            company: Some(company.clone()),
            records,
            charts,
            snapshot: Some(snapshot.clone()),
            score: PanelState::Loading,
            aml: PanelState::Loading,
            selected_at: Some(Utc::now()),
        };
        let ticket = SelectionTicket {
            generation,
            company,
            snapshot,
        };
        Ok((next, ticket))
    }

    /// Returns false, leaving the panel untouched, when `generation` is stale.
    pub fn apply_score(&mut self, generation: u64, state: PanelState<ScoreResult>) -> bool {
        if !self.is_current(generation, "score") {
            return false;
        }
        self.score = state;
        true
    }

    pub fn apply_aml(&mut self, generation: u64, state: PanelState<AmlResult>) -> bool {
        if !self.is_current(generation, "aml") {
            return false;
        }
        self.aml = state;
        true
    }

    fn is_current(&self, generation: u64, panel: &'static str) -> bool {
        if generation == self.generation {
            return true;
        }
        tracing::debug!(
            panel,
            result_generation = generation,
            current_generation = self.generation,
            "discarding stale panel result"
        );
        false
    }
}

/// Runs the scoring and AML flows. A missing client means that flow is not configured.
#[derive(Clone, Default)]
pub struct Reviewer {
    llm: Option<Arc<dyn LlmClient>>,
    news: Option<Arc<dyn NewsClient>>,
}

impl Reviewer {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, news: Option<Arc<dyn NewsClient>>) -> Self {
        Self { llm, news }
    }

    pub fn from_secrets(settings: &Settings, secrets: &dyn SecretsProvider) -> anyhow::Result<Self> {
        let llm = GeminiClient::from_secrets(settings, secrets)?
            .map(|c| Arc::new(c) as Arc<dyn LlmClient>);
        let news = GNewsClient::from_secrets(settings, secrets)?
            .map(|c| Arc::new(c) as Arc<dyn NewsClient>);
        if llm.is_none() {
            tracing::warn!("GEMINI_API_KEY not set; scoring and AML panels are disabled");
        } else if news.is_none() {
            tracing::warn!("NEWS_API_KEY not set; AML panel is disabled");
        }
        Ok(Self::new(llm, news))
    }

    /// Both panels concurrently. A failure in one never affects the other.
    pub async fn run_panels(
        &self,
        ticket: &SelectionTicket,
    ) -> (PanelState<ScoreResult>, PanelState<AmlResult>) {
        tokio::join!(self.run_score(ticket), self.run_aml(ticket))
    }

    pub async fn run_score(&self, ticket: &SelectionTicket) -> PanelState<ScoreResult> {
        let Some(llm) = self.llm.as_deref() else {
            return PanelState::NotConfigured {
                message: "GEMINI_API_KEY is not configured".to_string(),
            };
        };

        let started = Instant::now();
        match score(llm, ticket).await {
            Ok(result) => {
                tracing::info!(
                    generation = ticket.generation,
                    company = %ticket.company.id,
                    total = result.total,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "credit score ready"
                );
                PanelState::Ready { result }
            }
            Err(err) => {
                tracing::warn!(
                    generation = ticket.generation,
                    company = %ticket.company.id,
                    error = %err,
                    "credit scoring failed"
                );
                PanelState::failed(&err)
            }
        }
    }

    pub async fn run_aml(&self, ticket: &SelectionTicket) -> PanelState<AmlResult> {
        let (Some(llm), Some(news)) = (self.llm.as_deref(), self.news.as_deref()) else {
            return PanelState::NotConfigured {
                message: "NEWS_API_KEY and GEMINI_API_KEY are required for AML screening"
                    .to_string(),
            };
        };

        let started = Instant::now();
        match screen(llm, news, &ticket.company).await {
            Ok(result) => {
                tracing::info!(
                    generation = ticket.generation,
                    company = %ticket.company.id,
                    has_risk = result.has_risk,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "AML screen ready"
                );
                PanelState::Ready { result }
            }
            Err(err) => {
                tracing::warn!(
                    generation = ticket.generation,
                    company = %ticket.company.id,
                    error = %err,
                    "AML screening failed"
                );
                PanelState::failed(&err)
            }
        }
    }
}

async fn score(llm: &dyn LlmClient, ticket: &SelectionTicket) -> Result<ScoreResult, ServiceError> {
    let summary = ScoreSummary::new(&ticket.company, &ticket.snapshot);
    let prompt = build_score_prompt(&summary).map_err(|e| ServiceError::Request {
        service: SCORE_SERVICE,
        detail: format!("{e:#}"),
    })?;

    let text = llm.generate_text(&prompt, GenerationConfig::SCORE).await?;
    let value = parse_json_object(&text).map_err(|e| ServiceError::parse(SCORE_SERVICE, e))?;
    LlmScoreResult::from_json(value)
        .and_then(LlmScoreResult::validate_and_into_result)
        .map_err(|e| ServiceError::parse(SCORE_SERVICE, format!("{e:#}")))
}

async fn screen(
    llm: &dyn LlmClient,
    news: &dyn NewsClient,
    company: &Company,
) -> Result<AmlResult, ServiceError> {
    let articles = news.search_adverse_media(&company.name).await?;
    if articles.is_empty() {
        return Ok(AmlResult::clear_without_news());
    }

    let prompt = build_aml_prompt(&company.name, &articles);
    let text = llm.generate_text(&prompt, GenerationConfig::AML).await?;
    let value = parse_json_object(&text).map_err(|e| ServiceError::parse(AML_SERVICE, e))?;
    LlmAmlResult::from_json(value)
        .and_then(LlmAmlResult::validate_and_into_result)
        .map_err(|e| ServiceError::parse(AML_SERVICE, format!("{e:#}")))
}
