use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use super::search::SearchResult;
use super::AiError;
use crate::models::{LinkCategory, SuggestedLink};

/// Keyword fragments tried in order against the upper-cased raw label.
const CATEGORY_KEYWORDS: &[(&[&str], LinkCategory)] = &[
    (&["CADEAU", "GIFT"], LinkCategory::Cadeau),
    (&["ACTIVIT", "ACTIVITY"], LinkCategory::Activite),
    (&["RECETTE", "RECIPE"], LinkCategory::Recette),
    (&["EVENEMENT", "ÉVÉNEMENT", "ÉVÈNEMENT", "EVENT"], LinkCategory::Evenement),
];

/// Map any model-provided category label onto [`LinkCategory`].
///
/// Exact wire names are kept as-is; otherwise the first keyword hit wins and
/// anything unrecognised becomes [`LinkCategory::Idee`].
pub fn normalize_category(raw: &str) -> LinkCategory {
    let upper = raw.trim().to_uppercase();

    if let Ok(category) = LinkCategory::from_str(&upper) {
        return category;
    }

    CATEGORY_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| upper.contains(k)))
        .map(|(_, category)| *category)
        .unwrap_or(LinkCategory::Idee)
}

// ── Raw model output ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawIdeas {
    #[serde(default, deserialize_with = "null_as_default")]
    ideas: Vec<RawIdea>,
}

/// An idea exactly as the model wrote it. Every field is lenient: models
/// emit `null`, empty strings and missing keys interchangeably.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIdea {
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    description: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    tags: Vec<String>,
    #[serde(default)]
    age_range: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    ingredients: Vec<String>,
}

/// `null` and a missing key both decode as `T::default()`.
pub(super) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RawIdea {
    fn into_suggestion(self) -> Option<SuggestedLink> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let category = normalize_category(&self.category);
        let ingredients = if category == LinkCategory::Recette {
            self.ingredients
        } else {
            Vec::new()
        };

        Some(SuggestedLink {
            title,
            description: self.description.trim().to_string(),
            url: non_blank(self.url),
            image_url: non_blank(self.image_url),
            category,
            tags: self
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            age_range: non_blank(self.age_range),
            price: non_blank(self.price),
            location: non_blank(self.location),
            ingredients,
        })
    }
}

/// Decode the extracted JSON object into normalized suggestions.
///
/// Ideas without a title are dropped.
pub fn parse_ideas(json: &str) -> Result<Vec<SuggestedLink>, AiError> {
    let raw: RawIdeas =
        serde_json::from_str(json).map_err(|e| AiError::InvalidIdeas(e.to_string()))?;

    Ok(raw
        .ideas
        .into_iter()
        .filter_map(RawIdea::into_suggestion)
        .collect())
}

// ── Image backfill ─────────────────────────────────────────────────────────

pub fn build_search_image_map(results: &[SearchResult]) -> HashMap<&str, &str> {
    results
        .iter()
        .filter(|r| !r.url.is_empty())
        .filter_map(|r| {
            r.image_url
                .as_deref()
                .filter(|img| !img.is_empty())
                .map(|img| (r.url.as_str(), img))
        })
        .collect()
}

/// Copy search-result images onto ideas whose URL matches exactly.
///
/// Ideas that already have an image are left alone. Returns how many ideas
/// were filled.
pub fn backfill_images(ideas: &mut [SuggestedLink], results: &[SearchResult]) -> usize {
    let images = build_search_image_map(results);
    let mut filled = 0;

    for idea in ideas.iter_mut().filter(|i| i.image_url.is_none()) {
        if let Some(img) = idea.url.as_deref().and_then(|u| images.get(u)) {
            idea.image_url = Some((*img).to_string());
            filled += 1;
        }
    }

    filled
}
