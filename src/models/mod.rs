use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::{AsRefStr, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// Link Category
// ============================================================================

/// Fixed category vocabulary shared by links and AI suggestions.
///
/// The wire names carry the `LINK_CATEGORY_` prefix used by the clients.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
)]
pub enum LinkCategory {
    #[default]
    #[serde(rename = "LINK_CATEGORY_IDEE")]
    #[strum(serialize = "LINK_CATEGORY_IDEE")]
    Idee,
    #[serde(rename = "LINK_CATEGORY_CADEAU")]
    #[strum(serialize = "LINK_CATEGORY_CADEAU")]
    Cadeau,
    #[serde(rename = "LINK_CATEGORY_ACTIVITE")]
    #[strum(serialize = "LINK_CATEGORY_ACTIVITE")]
    Activite,
    #[serde(rename = "LINK_CATEGORY_RECETTE")]
    #[strum(serialize = "LINK_CATEGORY_RECETTE")]
    Recette,
    #[serde(rename = "LINK_CATEGORY_EVENEMENT")]
    #[strum(serialize = "LINK_CATEGORY_EVENEMENT")]
    Evenement,
}

// ============================================================================
// AI Suggestion Models
// ============================================================================

/// One structured suggestion produced by the AI pipeline.
///
/// `category` is always a member of [`LinkCategory`]; raw model labels never
/// reach this type without going through normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedLink {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: LinkCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    #[validate(length(min = 1, max = 1000, message = "Prompt must be 1–1 000 characters"))]
    pub prompt: String,
    /// Overrides the configured generation model for this call.
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub ideas: Vec<SuggestedLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<Uuid>,
}

// ============================================================================
// Folder Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Folder {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    /// "private" | "public" | "shared"
    pub visibility: String,
    pub is_ai_generated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Link Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Link {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub folder_id: Uuid,
    pub title: String,
    pub url: Option<String>,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub age_range: Option<String>,
    pub location: Option<String>,
    pub price: Option<String>,
    pub image_url: Option<String>,
    pub ingredients: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Link Preview
// ============================================================================

/// Page metadata for the link editor. Only `url` is always set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkPreviewDto {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site_name: Option<String>,
}
