use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::ai;
use crate::db::IdeaStore;
use crate::models::LinkPreviewDto;

pub type LinkPreviewCache = Arc<Mutex<HashMap<String, (LinkPreviewDto, Instant)>>>;

/// Shared application state passed to all handlers and extractors.
/// JWT secret is stored here (read once at startup) rather than re-reading
/// from the environment on every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn IdeaStore>,
    pub ai: Arc<ai::Service>,
    pub jwt_secret: Arc<str>,
    pub http_client: reqwest::Client,
    pub link_preview_cache: LinkPreviewCache,
}

impl AppState {
    pub fn new(store: Arc<dyn IdeaStore>, ai: ai::Service, jwt_secret: &str) -> Self {
        AppState {
            store,
            ai: Arc::new(ai),
            jwt_secret: Arc::from(jwt_secret),
            http_client: crate::handlers::link_preview::preview_client(),
            link_preview_cache: Arc::default(),
        }
    }
}
