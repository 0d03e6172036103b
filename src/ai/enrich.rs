use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Client as ReqwestClient;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};

use crate::config::PipelineSettings;
use crate::models::SuggestedLink;

pub const OG_USER_AGENT: &str = "Mozilla/5.0 (compatible; Tribbae/1.0)";

const OG_MARKER: &[u8] = b"og:image";

/// Locate the first `og:image` marker and return the value of the next
/// `content="..."` (or single-quoted) attribute after it.
///
/// This is a byte scan, not an HTML parse: it tolerates broken markup and
/// gives up when the value is longer than `max_value_len` bytes.
pub fn scan_og_image(body: &[u8], max_value_len: usize) -> Option<String> {
    let marker = find(body, OG_MARKER)?;
    let rest = &body[marker..];

    let (attr, quote) = find(rest, b"content=\"")
        .map(|i| (i, b'"'))
        .or_else(|| find(rest, b"content='").map(|i| (i, b'\'')))?;

    let value_start = attr + b"content=\"".len();
    let value = &rest[value_start..];
    let end = value.iter().position(|&b| b == quote)?;
    if end > max_value_len {
        return None;
    }

    let image = std::str::from_utf8(&value[..end]).ok()?.trim();
    (!image.is_empty()).then(|| image.to_string())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Fetch `url` and scan at most `og_body_limit` bytes of it for an OG image.
///
/// Every failure (network, status, timeout, no tag) is `None`.
pub async fn fetch_og_image(
    client: &ReqwestClient,
    url: &str,
    settings: &PipelineSettings,
) -> Option<String> {
    let mut response = client
        .get(url)
        .timeout(settings.scrape_timeout)
        .header(reqwest::header::USER_AGENT, OG_USER_AGENT)
        .send()
        .await
        .map_err(|e| tracing::debug!(error = ?e, url = %url, "OG fetch failed"))
        .ok()?;

    if !response.status().is_success() {
        tracing::debug!(status = %response.status(), url = %url, "OG fetch returned error status");
        return None;
    }

    let mut body: Vec<u8> = Vec::with_capacity(settings.og_body_limit.min(64 * 1024));
    while body.len() < settings.og_body_limit {
        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = ?e, url = %url, "OG body read failed");
                break;
            }
        }
    }
    body.truncate(settings.og_body_limit);

    scan_og_image(&body, settings.og_value_limit)
}

/// Scrape OG images for ideas that have a URL but still no image.
///
/// At most `enrich_concurrency` fetches run at once. The phase stops at
/// `deadline`; scrapes still running then are dropped and their ideas keep
/// an empty image. Returns how many images were found.
pub async fn enrich_images(
    client: &ReqwestClient,
    ideas: &mut [SuggestedLink],
    settings: &PipelineSettings,
    deadline: Instant,
) -> usize {
    let semaphore = Arc::new(Semaphore::new(settings.enrich_concurrency.max(1)));

    let mut tasks: FuturesUnordered<_> = ideas
        .iter()
        .enumerate()
        .filter(|(_, idea)| idea.image_url.is_none())
        .filter_map(|(idx, idea)| idea.url.clone().map(|url| (idx, url)))
        .map(|(idx, url)| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                fetch_og_image(client, &url, settings)
                    .await
                    .map(|image| (idx, image))
            }
        })
        .collect();

    let mut found = 0;
    loop {
        match timeout_at(deadline, tasks.next()).await {
            Ok(Some(Some((idx, image)))) => {
                ideas[idx].image_url = Some(image);
                found += 1;
            }
            Ok(Some(None)) => {}
            Ok(None) => break,
            Err(_) => {
                tracing::debug!(pending = tasks.len(), "OG enrichment deadline reached");
                break;
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_double_quoted_content() {
        let html = br#"<head><meta property="og:image" content="https://x.fr/a.jpg"></head>"#;
        assert_eq!(scan_og_image(html, 500).as_deref(), Some("https://x.fr/a.jpg"));
    }

    #[test]
    fn finds_single_quoted_content() {
        let html = br#"<meta property='og:image' content='https://x.fr/b.png'/>"#;
        assert_eq!(scan_og_image(html, 500).as_deref(), Some("https://x.fr/b.png"));
    }

    #[test]
    fn content_before_property_attribute_is_missed() {
        // The scan only looks forward from the marker.
        let html = br#"<meta content="https://x.fr/c.jpg" property="og:image">"#;
        assert_eq!(scan_og_image(html, 500), None);
    }

    #[test]
    fn missing_marker_yields_none() {
        assert_eq!(scan_og_image(b"<html><title>x</title></html>", 500), None);
    }

    #[test]
    fn overlong_value_is_rejected() {
        let long = "a".repeat(600);
        let html = format!(r#"<meta property="og:image" content="https://x.fr/{long}">"#);
        assert_eq!(scan_og_image(html.as_bytes(), 500), None);
    }

    #[test]
    fn unterminated_value_yields_none() {
        assert_eq!(scan_og_image(br#"<meta property="og:image" content="https://x"#, 500), None);
    }

    #[test]
    fn tolerates_broken_markup_and_invalid_utf8_elsewhere() {
        let mut html = vec![0xff, 0xfe, b'<', b'd', b'i', b'v'];
        html.extend_from_slice(br#"<<meta og:image content="/img.jpg" <p"#);
        assert_eq!(scan_og_image(&html, 500).as_deref(), Some("/img.jpg"));
    }

    #[test]
    fn ideas_without_url_or_with_image_are_not_fetched() {
        let mut ideas = vec![
            SuggestedLink {
                title: "Sans lien".into(),
                description: String::new(),
                url: None,
                image_url: None,
                category: Default::default(),
                tags: vec![],
                age_range: None,
                price: None,
                location: None,
                ingredients: vec![],
            },
            SuggestedLink {
                title: "Déjà illustré".into(),
                description: String::new(),
                // Unroutable: a fetch attempt would fail rather than succeed.
                url: Some("http://127.0.0.1:9/page".into()),
                image_url: Some("https://x.fr/kept.jpg".into()),
                category: Default::default(),
                tags: vec![],
                age_range: None,
                price: None,
                location: None,
                ingredients: vec![],
            },
        ];
        let settings = PipelineSettings::default();
        let client = ReqwestClient::new();

        let found = tokio_test::block_on(async {
            let deadline = Instant::now() + settings.enrich_timeout;
            enrich_images(&client, &mut ideas, &settings, deadline).await
        });

        assert_eq!(found, 0);
        assert!(ideas[0].image_url.is_none());
        assert_eq!(ideas[1].image_url.as_deref(), Some("https://x.fr/kept.jpg"));
    }

    #[test]
    fn first_marker_wins_even_for_sub_properties() {
        let html = br#"<meta property="og:image:width" content="1200">
            <meta property="og:image" content="https://x.fr/d.jpg">"#;
        assert_eq!(scan_og_image(html, 500).as_deref(), Some("1200"));
    }
}
