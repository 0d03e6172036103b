pub mod ai;
pub mod link_preview;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{error::AppError, state::AppState};

/// All application routes, without the process-level layers (CORS,
/// tracing, metrics) that `main` adds.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/ai/generate", post(ai::generate))
        .route("/v1/links/preview", get(link_preview::get_link_preview))
        .with_state(state)
}

pub(crate) fn validation_error(e: validator::ValidationErrors) -> AppError {
    AppError::Validation(
        e.field_errors()
            .values()
            .flat_map(|v| v.iter())
            .filter_map(|e| e.message.as_ref())
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db_ok = match state.store.health().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = ?e, "Health check: database query failed");
            false
        }
    };

    let http_status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let ai = state.ai.config();
    (
        http_status,
        Json(json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "service": "tribbae-server",
            "version": env!("CARGO_PKG_VERSION"),
            "database": if db_ok { "ok" } else { "unavailable" },
            "ai": {
                "model": ai.ollama_model,
                "web_search": ai.searx_url.is_some(),
                "premium_search": ai.gemini_api_key.is_some(),
            },
        })),
    )
}
