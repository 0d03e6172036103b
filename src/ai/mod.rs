//! AI suggestion pipeline: web search grounding, local generation, JSON
//! extraction, normalization and OG image enrichment.

pub mod enrich;
pub mod generate;
pub mod normalize;
pub mod query;
pub mod search;

use std::future::Future;
use std::time::Duration;

use reqwest::{Client as ReqwestClient, StatusCode};
use thiserror::Error;
use tokio::time::{timeout_at, Instant};

use crate::config::{AiConfig, PipelineSettings};
use crate::models::SuggestedLink;
use search::{GeminiTarget, SearchPlan, SearchResult};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Searching,
    Generating,
    Extracting,
    Normalizing,
    Enriching,
}

#[derive(Error, Debug)]
pub enum AiError {
    #[error("ollama unreachable: {0}")]
    BackendUnreachable(#[source] reqwest::Error),

    #[error("ollama returned status {0}")]
    BackendStatus(StatusCode),

    #[error("invalid ollama response: {0}")]
    InvalidBackendResponse(String),

    #[error("no JSON found in ollama response")]
    NoJson,

    #[error("failed to parse ideas JSON: {0}")]
    InvalidIdeas(String),

    #[error("generation timed out while {stage}")]
    Timeout { stage: Stage },
}

pub type AiResult<T> = Result<T, AiError>;

/// Caller classification that picks the search provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Standard,
    Premium,
}

impl From<bool> for Tier {
    fn from(is_premium: bool) -> Self {
        if is_premium {
            Tier::Premium
        } else {
            Tier::Standard
        }
    }
}

/// Owns the outbound HTTP client and endpoint configuration. One instance is
/// shared by every request; each `generate` call is independent.
pub struct Service {
    client: ReqwestClient,
    config: AiConfig,
    settings: PipelineSettings,
}

impl Service {
    pub fn new(config: AiConfig) -> Self {
        Self::with_settings(config, PipelineSettings::default())
    }

    pub fn with_settings(config: AiConfig, settings: PipelineSettings) -> Self {
        let client = ReqwestClient::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = ?e, "Falling back to default HTTP client");
                ReqwestClient::new()
            });

        Service {
            client,
            config,
            settings,
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn search_plan(&self, tier: Tier) -> SearchPlan<'_> {
        let gemini = match (tier, self.config.gemini_api_key.as_deref()) {
            (Tier::Premium, Some(api_key)) => Some(GeminiTarget {
                api_url: &self.config.gemini_api_url,
                model: &self.config.gemini_model,
                api_key,
            }),
            _ => None,
        };

        SearchPlan {
            gemini,
            searx_url: self.config.searx_url.as_deref(),
        }
    }

    /// Turn a free-text prompt into grounded, normalized link ideas.
    ///
    /// Search problems only thin out the grounding context. A generation
    /// failure, missing JSON or the overall deadline expiring fails the call
    /// and no partial list is returned.
    #[tracing::instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub async fn generate(
        &self,
        prompt: &str,
        model: Option<&str>,
        tier: Tier,
    ) -> AiResult<Vec<SuggestedLink>> {
        let start = std::time::Instant::now();
        let deadline = Instant::now() + self.settings.total_timeout;
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.config.ollama_model.as_str());

        tracing::info!(model = %model, "Starting idea generation");

        // Searching
        let plan = self.search_plan(tier);
        let (results, source): (Vec<SearchResult>, _) = within(
            deadline,
            Stage::Searching,
            search::grounded_search(&self.client, &plan, prompt, &self.settings),
        )
        .await?;
        tracing::info!(source = %source, results = results.len(), "Grounding search done");

        // Generating
        let full_prompt =
            generate::build_prompt(&search::format_search_context(&results), prompt);
        let t = std::time::Instant::now();
        tracing::debug!(prompt_chars = full_prompt.len(), "Calling generation backend");
        let raw = within(
            deadline,
            Stage::Generating,
            generate::call_ollama(
                &self.client,
                &self.config.ollama_url,
                model,
                &full_prompt,
                &self.settings,
            ),
        )
        .await??;
        tracing::info!(
            elapsed_ms = t.elapsed().as_millis() as u64,
            "Generation backend responded"
        );

        // Extracting
        let json = generate::extract_json(&raw).ok_or_else(|| {
            tracing::warn!(
                stage = %Stage::Extracting,
                response_chars = raw.len(),
                "No JSON object in model output"
            );
            AiError::NoJson
        })?;

        // Normalizing
        let mut ideas = normalize::parse_ideas(json).map_err(|e| {
            tracing::warn!(stage = %Stage::Normalizing, error = %e, "Model JSON rejected");
            e
        })?;
        let backfilled = normalize::backfill_images(&mut ideas, &results);

        // Enriching
        let enrich_deadline = deadline.min(Instant::now() + self.settings.enrich_timeout);
        tracing::debug!(stage = %Stage::Enriching, ideas = ideas.len(), backfilled, "Scraping OG images");
        let scraped =
            enrich::enrich_images(&self.client, &mut ideas, &self.settings, enrich_deadline)
                .await;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            ideas = ideas.len(),
            backfilled,
            scraped,
            "Idea generation finished"
        );
        Ok(ideas)
    }
}

/// Run `fut` unless the pipeline deadline passes first.
async fn within<F: Future>(deadline: Instant, stage: Stage, fut: F) -> AiResult<F::Output> {
    timeout_at(deadline, fut).await.map_err(|_| {
        tracing::warn!(stage = %stage, "Pipeline deadline exceeded");
        AiError::Timeout { stage }
    })
}
