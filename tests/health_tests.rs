mod common;

use std::sync::Arc;

use axum::http::StatusCode;

use common::InMemoryStore;
use tribbae_server::config::{AiConfig, PipelineSettings};

#[tokio::test]
async fn health_reports_ok_and_ai_capabilities() {
    let config = AiConfig {
        searx_url: Some("http://searx.invalid".into()),
        ..AiConfig::default()
    };
    let app = common::create_test_app(InMemoryStore::new(), config, PipelineSettings::default());

    let (status, body) = common::get_no_auth(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
    assert_eq!(body["ai"]["model"], "qwen2.5:3b");
    assert_eq!(body["ai"]["web_search"], true);
    assert_eq!(body["ai"]["premium_search"], false);
}

#[tokio::test]
async fn health_is_degraded_when_store_is_down() {
    let store = Arc::new(InMemoryStore {
        fail_health: true,
        ..InMemoryStore::default()
    });
    let app = common::create_test_app(store, AiConfig::default(), PipelineSettings::default());

    let (status, body) = common::get_no_auth(app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
}
