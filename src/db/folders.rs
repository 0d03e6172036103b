use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{health_check, IdeaStore};
use crate::error::AppResult;
use crate::models::{Folder, Link, SuggestedLink};

const AI_FOLDER_VISIBILITY: &str = "shared";

/// [`IdeaStore`] backed by the main Postgres pool.
#[derive(Clone)]
pub struct PgIdeaStore {
    pool: PgPool,
}

impl PgIdeaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdeaStore for PgIdeaStore {
    async fn is_premium(&self, user_id: Uuid) -> AppResult<bool> {
        let premium: Option<bool> =
            sqlx::query_scalar("SELECT is_premium FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(premium.unwrap_or(false))
    }

    async fn create_ai_folder(&self, owner_id: Uuid, name: &str) -> AppResult<Folder> {
        let folder = sqlx::query_as::<_, Folder>(
            "INSERT INTO folders (owner_id, name, visibility, is_ai_generated)
             VALUES ($1, $2, $3, TRUE)
             RETURNING id, owner_id, name, visibility, is_ai_generated, created_at, updated_at",
        )
        .bind(owner_id)
        .bind(name)
        .bind(AI_FOLDER_VISIBILITY)
        .fetch_one(&self.pool)
        .await?;

        Ok(folder)
    }

    async fn create_link(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
        idea: &SuggestedLink,
    ) -> AppResult<Link> {
        let category: &'static str = idea.category.into();

        let link = sqlx::query_as::<_, Link>(
            "INSERT INTO links (owner_id, folder_id, title, url, description, category, tags,
                                age_range, location, price, image_url, ingredients)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING id, owner_id, folder_id, title, url, description, category, tags,
                       age_range, location, price, image_url, ingredients, created_at, updated_at",
        )
        .bind(owner_id)
        .bind(folder_id)
        .bind(&idea.title)
        .bind(&idea.url)
        .bind(&idea.description)
        .bind(category)
        .bind(&idea.tags)
        .bind(&idea.age_range)
        .bind(&idea.location)
        .bind(&idea.price)
        .bind(&idea.image_url)
        .bind(&idea.ingredients)
        .fetch_one(&self.pool)
        .await?;

        Ok(link)
    }

    async fn health(&self) -> AppResult<()> {
        health_check(&self.pool).await
    }
}
