// Each integration test file is a separate binary; helpers not used in every
// binary would otherwise trigger dead_code warnings from clippy.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::{
    async_trait,
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use tribbae_server::{
    ai,
    auth::create_access_token,
    config::{AiConfig, PipelineSettings},
    db::IdeaStore,
    error::{AppError, AppResult},
    handlers,
    models::{Folder, Link, SuggestedLink},
    state::AppState,
};

pub const TEST_JWT_SECRET: &str = "test-secret-min-32-characters-long!!";

// ── In-memory store ──────────────────────────────────────────────────────────

/// [`IdeaStore`] double that records every write and can be told to fail.
#[derive(Default)]
pub struct InMemoryStore {
    pub premium: Mutex<HashSet<Uuid>>,
    pub folders: Mutex<Vec<Folder>>,
    pub links: Mutex<Vec<Link>>,
    pub fail_folders: bool,
    pub fail_links: bool,
    pub fail_health: bool,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_premium(user_id: Uuid) -> Arc<Self> {
        let store = Self::default();
        store.premium.lock().unwrap().insert(user_id);
        Arc::new(store)
    }

    pub fn folders(&self) -> Vec<Folder> {
        self.folders.lock().unwrap().clone()
    }

    pub fn links(&self) -> Vec<Link> {
        self.links.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdeaStore for InMemoryStore {
    async fn is_premium(&self, user_id: Uuid) -> AppResult<bool> {
        Ok(self.premium.lock().unwrap().contains(&user_id))
    }

    async fn create_ai_folder(&self, owner_id: Uuid, name: &str) -> AppResult<Folder> {
        if self.fail_folders {
            return Err(AppError::Internal);
        }
        let now = Utc::now();
        let folder = Folder {
            id: Uuid::new_v4(),
            owner_id,
            name: name.to_string(),
            visibility: "shared".into(),
            is_ai_generated: true,
            created_at: now,
            updated_at: now,
        };
        self.folders.lock().unwrap().push(folder.clone());
        Ok(folder)
    }

    async fn create_link(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
        idea: &SuggestedLink,
    ) -> AppResult<Link> {
        if self.fail_links {
            return Err(AppError::Internal);
        }
        let now = Utc::now();
        let category: &'static str = idea.category.into();
        let link = Link {
            id: Uuid::new_v4(),
            owner_id,
            folder_id,
            title: idea.title.clone(),
            url: idea.url.clone(),
            description: idea.description.clone(),
            category: category.to_string(),
            tags: idea.tags.clone(),
            age_range: idea.age_range.clone(),
            location: idea.location.clone(),
            price: idea.price.clone(),
            image_url: idea.image_url.clone(),
            ingredients: idea.ingredients.clone(),
            created_at: now,
            updated_at: now,
        };
        self.links.lock().unwrap().push(link.clone());
        Ok(link)
    }

    async fn health(&self) -> AppResult<()> {
        if self.fail_health {
            return Err(AppError::Internal);
        }
        Ok(())
    }
}

// ── App and upstream stubs ───────────────────────────────────────────────────

/// Build the full application router around `store` and the given upstreams.
pub fn create_test_app(
    store: Arc<InMemoryStore>,
    ai_config: AiConfig,
    settings: PipelineSettings,
) -> Router {
    let state = AppState::new(
        store,
        ai::Service::with_settings(ai_config, settings),
        TEST_JWT_SECRET,
    );
    handlers::router(state)
}

/// Config pointing the generation backend at `ollama_url` with nothing else
/// configured.
pub fn ai_config(ollama_url: &str) -> AiConfig {
    AiConfig {
        ollama_url: ollama_url.to_string(),
        ..AiConfig::default()
    }
}

/// Serve `app` on an ephemeral localhost port and return its base URL.
pub async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn token_for(user_id: Uuid) -> String {
    create_access_token(user_id, TEST_JWT_SECRET).unwrap()
}

// ── Request helpers ──────────────────────────────────────────────────────────

pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn post_json_authed(
    app: Router,
    uri: &str,
    token: &str,
    body: Value,
) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn get_authed(app: Router, uri: &str, token: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

pub async fn get_no_auth(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
