use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_QUERIES: usize = 4;
const MAX_PLACE_WORDS: usize = 4;

const RECIPE_KEYWORDS: &[&str] = &["recette", "recipe"];

/// Locative markers, French first. The first match wins; everything after
/// it (up to [`MAX_PLACE_WORDS`] words) is taken as the place name.
static LOCATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|\s)(?:près de|autour de|à|au|aux|dans|vers|near|around|in|at)\s+(\S.*)")
        .expect("locative regex is valid")
});

/// Derive 2–4 search queries from a raw user prompt.
///
/// The first query is always the trimmed prompt. When a place is detected two
/// location-flavoured variants follow, then exactly one of a recipe variant
/// or a generic reviews variant.
pub fn build_search_queries(prompt: &str) -> Vec<String> {
    let p = prompt.trim();
    let mut queries = vec![p.to_string()];

    if let Some(place) = detect_place(p) {
        queries.push(format!("{place} tourisme"));
        queries.push(format!("{place} que faire"));
    }

    if is_recipe_prompt(p) {
        queries.push(format!("{p} recette facile"));
    } else {
        queries.push(format!("{p} avis recommandation"));
    }

    queries.truncate(MAX_QUERIES);
    queries
}

pub fn is_recipe_prompt(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    RECIPE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Words following the first locative marker, with trailing punctuation
/// stripped. Returns `None` when no marker is followed by a word.
pub fn detect_place(prompt: &str) -> Option<String> {
    let caps = LOCATIVE_RE.captures(prompt)?;
    let words: Vec<&str> = caps
        .get(1)?
        .as_str()
        .split_whitespace()
        .take(MAX_PLACE_WORDS)
        .collect();

    let place = words
        .join(" ")
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_string();

    (!place.is_empty()).then_some(place)
}
