use axum::{extract::State, Json};
use uuid::Uuid;
use validator::Validate;

use super::validation_error;
use crate::{
    ai::Tier,
    auth::MaybeAuthUser,
    db::IdeaStore,
    error::{AppError, AppResult},
    models::{GenerateRequest, GenerateResponse, SuggestedLink},
    state::AppState,
};

const FOLDER_NAME_MAX_CHARS: usize = 60;
const FOLDER_NAME_PREFIX: &str = "✨ ";

/// Folder title derived from the prompt: trimmed, first letter capitalised,
/// cut to 60 characters with an ellipsis.
pub fn build_folder_name(prompt: &str) -> String {
    let trimmed = prompt.trim();
    let mut name: String = trimmed.chars().take(FOLDER_NAME_MAX_CHARS).collect();
    if trimmed.chars().count() > FOLDER_NAME_MAX_CHARS {
        name.push_str("...");
    }

    let mut chars = name.chars();
    let capitalised: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };

    format!("{FOLDER_NAME_PREFIX}{capitalised}")
}

async fn caller_tier(store: &dyn IdeaStore, user_id: Option<Uuid>) -> Tier {
    let Some(user_id) = user_id else {
        return Tier::Standard;
    };

    match store.is_premium(user_id).await {
        Ok(premium) => Tier::from(premium),
        Err(e) => {
            tracing::warn!(error = %e, user_id = %user_id, "Premium lookup failed, using standard tier");
            Tier::Standard
        }
    }
}

/// Persist the ideas into a fresh shared folder. Best effort: a folder
/// failure skips everything, a link failure skips that link.
pub async fn save_ideas_to_folder(
    store: &dyn IdeaStore,
    owner_id: Uuid,
    prompt: &str,
    ideas: &[SuggestedLink],
) -> Option<Uuid> {
    let folder = match store
        .create_ai_folder(owner_id, &build_folder_name(prompt))
        .await
    {
        Ok(folder) => folder,
        Err(e) => {
            tracing::warn!(error = %e, owner_id = %owner_id, "Could not create AI folder");
            return None;
        }
    };

    let mut saved = 0usize;
    for idea in ideas {
        match store.create_link(owner_id, folder.id, idea).await {
            Ok(_) => saved += 1,
            Err(e) => {
                tracing::warn!(error = %e, folder_id = %folder.id, title = %idea.title, "Could not save AI idea");
            }
        }
    }

    tracing::info!(folder_id = %folder.id, saved, total = ideas.len(), "AI folder created");
    Some(folder.id)
}

/// POST /v1/ai/generate
///
/// Anonymous callers get ideas only. Authenticated callers also get them
/// saved to a new folder whose id is returned as `folderId`.
pub async fn generate(
    State(state): State<AppState>,
    MaybeAuthUser(auth): MaybeAuthUser,
    Json(req): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    req.validate().map_err(validation_error)?;
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::Validation("prompt is required".into()));
    }

    let user_id = auth.map(|a| a.user_id());
    let tier = caller_tier(state.store.as_ref(), user_id).await;

    let ideas = state
        .ai
        .generate(prompt, req.model.as_deref(), tier)
        .await?;

    let folder_id = match user_id {
        Some(owner_id) if !ideas.is_empty() => {
            save_ideas_to_folder(state.store.as_ref(), owner_id, prompt, &ideas).await
        }
        _ => None,
    };

    Ok(Json(GenerateResponse { ideas, folder_id }))
}
