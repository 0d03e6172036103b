use std::sync::Arc;

use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tribbae_server::config::Config;
use tribbae_server::state::AppState;
use tribbae_server::{ai, db, handlers};

#[tokio::main]
async fn main() {
    // JSON logs in production, human-readable in dev
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "tribbae_server=info,tower_http=info,sqlx=warn"
            .parse()
            .unwrap()
    });

    if std::env::var("APP_ENV").as_deref() == Ok("production") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("🚀 Tribbae Server starting...");

    let config = Config::from_env().expect("Failed to load configuration");
    info!("📝 Configuration loaded");

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    info!("✅ Database migrations applied");

    db::health_check(&pool)
        .await
        .expect("Database health check failed");
    info!("✅ Database health check passed");

    match &config.ai.searx_url {
        Some(url) => info!("🔎 Web search: {}", url),
        None => tracing::warn!("🔎 SEARXNG_URL not set, suggestions will not be grounded"),
    }
    if config.ai.gemini_api_key.is_some() {
        info!("💎 Premium search provider enabled");
    }
    info!(
        "🤖 Generation backend: {} ({})",
        config.ai.ollama_url, config.ai.ollama_model
    );

    let cors = if config.is_dev {
        info!("🔓 CORS: permissive (dev mode)");
        CorsLayer::permissive()
    } else {
        tracing::warn!("🔒 CORS: restrictive (production mode)");
        CorsLayer::new()
    };

    let addr = config.server_addr();

    let app_state = AppState::new(
        Arc::new(db::PgIdeaStore::new(pool)),
        ai::Service::new(config.ai),
        &config.jwt_secret,
    );

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = handlers::router(app_state)
        .route(
            "/metrics",
            get(move || async move { metric_handle.render() }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(prometheus_layer)
        .layer(cors);

    info!("🎧 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
