use std::collections::HashSet;
use std::time::Instant;

use futures::future::join_all;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::time::timeout_at;

use super::normalize::null_as_default;
use super::query::build_search_queries;
use crate::config::PipelineSettings;

pub const SEARCH_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const SEARCH_LANG: &str = "fr";

/// One web search hit, scoped to a single generation call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search backend unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("search backend returned status {0}")]
    Status(StatusCode),

    #[error("search backend returned non-JSON, starts with: {0}")]
    NotJson(String),

    #[error("invalid search response: {0}")]
    Decode(String),

    #[error("search provider error: {0}")]
    Provider(String),

    #[error("search timed out")]
    Timeout,
}

/// Which backend produced the grounding context. Logged only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SearchSource {
    Gemini,
    Searxng,
    None,
}

// ── SearXNG ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SearxResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    results: Vec<SearxHit>,
}

#[derive(Deserialize)]
struct SearxHit {
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    content: String,
    #[serde(default)]
    img_src: Option<String>,
}

/// Query the self-hosted SearXNG instance once.
///
/// Drops hits with neither title nor content, shortens excerpts and caps the
/// count at `max_results`.
pub async fn search_web(
    client: &ReqwestClient,
    searx_url: &str,
    query: &str,
    max_results: usize,
    settings: &PipelineSettings,
) -> Result<Vec<SearchResult>, SearchError> {
    let req_url = format!("{}/search", searx_url.trim_end_matches('/'));

    let response = client
        .post(&req_url)
        .timeout(settings.query_timeout)
        .header(reqwest::header::ACCEPT, "application/json")
        .header(reqwest::header::USER_AGENT, SEARCH_USER_AGENT)
        .form(&[("q", query), ("format", "json"), ("lang", SEARCH_LANG)])
        .send()
        .await
        .map_err(SearchError::Unreachable)?;

    if response.status() != StatusCode::OK {
        return Err(SearchError::Status(response.status()));
    }

    let raw = response.text().await.map_err(SearchError::Unreachable)?;
    parse_searx_body(&raw, max_results, settings.excerpt_chars)
}

pub fn parse_searx_body(
    raw: &str,
    max_results: usize,
    excerpt_chars: usize,
) -> Result<Vec<SearchResult>, SearchError> {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && !trimmed.starts_with('{') {
        let preview: String = trimmed.chars().take(200).collect();
        return Err(SearchError::NotJson(preview));
    }

    let parsed: SearxResponse =
        serde_json::from_str(trimmed).map_err(|e| SearchError::Decode(e.to_string()))?;

    Ok(parsed
        .results
        .into_iter()
        .filter(|hit| !(hit.title.is_empty() && hit.content.is_empty()))
        .take(max_results)
        .map(|hit| SearchResult {
            title: hit.title,
            url: hit.url,
            content: truncate_excerpt(&hit.content, excerpt_chars),
            image_url: hit.img_src.filter(|s| !s.is_empty()),
        })
        .collect())
}

fn truncate_excerpt(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let mut out: String = content.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Run every planned query concurrently and merge the hits.
///
/// Merge order is query submission order, so the first-seen URL wins
/// regardless of which query finished first. Failed or timed-out queries
/// contribute nothing; this never returns an error.
pub async fn search_web_multi(
    client: &ReqwestClient,
    searx_url: &str,
    prompt: &str,
    max_results: usize,
    settings: &PipelineSettings,
) -> Vec<SearchResult> {
    let deadline = tokio::time::Instant::now() + settings.search_timeout;
    let queries = build_search_queries(prompt);

    let tasks = queries.iter().map(|query| async move {
        match timeout_at(
            deadline,
            search_web(client, searx_url, query, settings.results_per_query, settings),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout),
        }
    });

    let outcomes = join_all(tasks).await;

    let per_query = queries
        .iter()
        .zip(outcomes)
        .filter_map(|(query, outcome)| match outcome {
            Ok(results) => Some(results),
            Err(e) => {
                tracing::warn!(error = %e, query = %query, "Search query failed");
                None
            }
        });

    dedup_by_url(per_query, max_results)
}

/// Flatten result batches in order, keeping the first entry per URL and at
/// most `max_results` entries overall.
pub fn dedup_by_url<I>(batches: I, max_results: usize) -> Vec<SearchResult>
where
    I: IntoIterator<Item = Vec<SearchResult>>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for result in batches.into_iter().flatten() {
        if merged.len() >= max_results {
            break;
        }
        if seen.insert(result.url.clone()) {
            merged.push(result);
        }
    }

    merged
}

// ── Gemini ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

#[derive(Deserialize, Default)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

/// Ask the hosted Gemini API for grounding material.
///
/// The answer is free text, so it becomes one synthetic result with no URL.
pub async fn search_with_gemini(
    client: &ReqwestClient,
    api_url: &str,
    model: &str,
    api_key: &str,
    prompt: &str,
    settings: &PipelineSettings,
) -> Result<Vec<SearchResult>, SearchError> {
    let url = format!(
        "{}/v1beta/models/{}:generateContent",
        api_url.trim_end_matches('/'),
        model
    );

    let body = json!({
        "contents": [{
            "parts": [{
                "text": format!(
                    "Recherche des informations pertinentes sur : {prompt}. Fournis 5 résultats \
                     avec titre, description et contexte utile pour des idées familiales."
                ),
            }],
        }],
        "generationConfig": {
            "temperature": 0.2,
            "maxOutputTokens": 1000,
        },
    });

    let response = client
        .post(&url)
        .query(&[("key", api_key)])
        .timeout(settings.provider_timeout)
        .json(&body)
        .send()
        .await
        .map_err(SearchError::Unreachable)?;

    let status = response.status();
    if status != StatusCode::OK {
        let detail = response.text().await.unwrap_or_default();
        return Err(SearchError::Provider(format!(
            "gemini returned status {status}: {detail}"
        )));
    }

    let parsed: GeminiResponse = response
        .json()
        .await
        .map_err(|e| SearchError::Decode(e.to_string()))?;

    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| SearchError::Provider("no results from gemini".into()))?;

    Ok(vec![SearchResult {
        title: format!("Résultats Gemini pour: {prompt}"),
        url: String::new(),
        content: text,
        image_url: None,
    }])
}

// ── Tiered orchestration ───────────────────────────────────────────────────

/// Search backends reachable for one call, decided once at pipeline entry.
pub struct SearchPlan<'a> {
    pub gemini: Option<GeminiTarget<'a>>,
    pub searx_url: Option<&'a str>,
}

pub struct GeminiTarget<'a> {
    pub api_url: &'a str,
    pub model: &'a str,
    pub api_key: &'a str,
}

/// Primary/secondary search: Gemini first when planned, SearXNG otherwise or
/// on Gemini failure. Never fails; an empty list means no grounding context.
pub async fn grounded_search(
    client: &ReqwestClient,
    plan: &SearchPlan<'_>,
    prompt: &str,
    settings: &PipelineSettings,
) -> (Vec<SearchResult>, SearchSource) {
    if let Some(gemini) = &plan.gemini {
        let start = Instant::now();
        match search_with_gemini(
            client,
            gemini.api_url,
            gemini.model,
            gemini.api_key,
            prompt,
            settings,
        )
        .await
        {
            Ok(results) => {
                tracing::info!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    results = results.len(),
                    "Gemini search finished"
                );
                return (results, SearchSource::Gemini);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Gemini search failed, falling back to SearXNG");
            }
        }
    }

    let Some(searx_url) = plan.searx_url else {
        return (Vec::new(), SearchSource::None);
    };

    let start = Instant::now();
    let results =
        search_web_multi(client, searx_url, prompt, settings.max_search_results, settings).await;
    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        results = results.len(),
        "SearXNG search finished"
    );
    (results, SearchSource::Searxng)
}

/// Render results as the numbered grounding block appended to the prompt.
pub fn format_search_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut out = String::from("\n\n--- RÉSULTATS WEB ---\n");
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!("[{}] {}\n", i + 1, r.title));
        if !r.url.is_empty() {
            out.push_str(&format!("    URL: {}\n", r.url));
        }
        if !r.content.is_empty() {
            out.push_str(&format!("    {}\n", r.content));
        }
    }
    out.push_str("---\n");
    out
}
