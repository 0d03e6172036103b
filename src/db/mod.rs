mod folders;

pub use folders::PgIdeaStore;

use axum::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Folder, Link, SuggestedLink};

pub async fn create_pool(database_url: &str) -> AppResult<PgPool> {
    info!("🔌 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {:?}", e);
            AppError::Database(e)
        })?;

    info!("✅ Database connection pool created");
    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

    Ok(())
}

/// Persistence used around the AI pipeline: premium lookup before it runs,
/// folder and link creation after it succeeds.
#[async_trait]
pub trait IdeaStore: Send + Sync {
    async fn is_premium(&self, user_id: Uuid) -> AppResult<bool>;

    /// Create a shared folder flagged as AI-generated.
    async fn create_ai_folder(&self, owner_id: Uuid, name: &str) -> AppResult<Folder>;

    async fn create_link(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
        idea: &SuggestedLink,
    ) -> AppResult<Link>;

    async fn health(&self) -> AppResult<()>;
}
