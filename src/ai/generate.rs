use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use serde_json::json;

use super::AiError;
use crate::config::PipelineSettings;

pub const SYSTEM_PROMPT: &str = r#"Assistant familial français. Génère 3 idées en JSON.
Format: {"ideas":[{"title":"...","description":"...","url":"...","category":"LINK_CATEGORY_CADEAU|LINK_CATEGORY_ACTIVITE|LINK_CATEGORY_RECETTE|LINK_CATEGORY_EVENEMENT|LINK_CATEGORY_IDEE","tags":["..."],"ageRange":"...","price":"...","location":"...","ingredients":[]}]}
Règles: français uniquement, JSON valide sans markdown, base-toi sur les résultats web fournis.
N'invente aucun fait, lieu, prix ou URL absent des résultats web. "ingredients" seulement pour LINK_CATEGORY_RECETTE."#;

/// System instructions, then the grounding block, then the user's request.
pub fn build_prompt(search_context: &str, prompt: &str) -> String {
    format!("{SYSTEM_PROMPT}{search_context}\n\nDemande : {prompt}")
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Single non-streaming call to Ollama's `/api/generate`.
pub async fn call_ollama(
    client: &ReqwestClient,
    ollama_url: &str,
    model: &str,
    full_prompt: &str,
    settings: &PipelineSettings,
) -> Result<String, AiError> {
    let url = format!("{}/api/generate", ollama_url.trim_end_matches('/'));

    let body = json!({
        "model": model,
        "prompt": full_prompt,
        "stream": false,
        "options": {
            "temperature": settings.temperature,
            "num_predict": settings.num_predict,
            "num_ctx": settings.num_ctx,
        },
    });

    let response = client
        .post(&url)
        .timeout(settings.generation_timeout)
        .json(&body)
        .send()
        .await
        .map_err(AiError::BackendUnreachable)?;

    let status = response.status();
    if !status.is_success() {
        return Err(AiError::BackendStatus(status));
    }

    let raw = response
        .bytes()
        .await
        .map_err(AiError::BackendUnreachable)?;

    let parsed: OllamaResponse = serde_json::from_slice(&raw)
        .map_err(|e| AiError::InvalidBackendResponse(e.to_string()))?;

    Ok(parsed.response)
}

/// First balanced top-level `{...}` in `s`, by brace depth.
///
/// Braces inside string literals are counted too. Returns `None` when there
/// is no `{` or the braces never close.
pub fn extract_json(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;

    for (i, b) in s.bytes().enumerate().skip(start) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=i]);
                }
            }
            _ => {}
        }
    }

    None
}
