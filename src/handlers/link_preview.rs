use std::net::IpAddr;
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::Json;
use scraper::{Html, Selector};
use serde::Deserialize;
use url::Url;

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::LinkPreviewDto;
use crate::state::{AppState, LinkPreviewCache};

pub const CACHE_TTL: Duration = Duration::from_secs(86_400);
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(8);
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; Tribbae/1.0)";
pub const PREVIEW_BODY_LIMIT: usize = 512 * 1024;
pub const MAX_REDIRECTS: usize = 5;

// ── Target validation ──────────────────────────────────────────────────────

/// Returns `true` if `ip` is a private, loopback, or link-local address.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            matches!(
                o,
                [127, ..]
                    | [10, ..]
                    | [169, 254, ..]
                    | [192, 168, ..]
                    | [0, ..]
                    | [255, 255, 255, 255]
            ) || (o[0] == 172 && (16..=31).contains(&o[1]))
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00 == 0xfc00)
                || (v6.segments()[0] & 0xffc0 == 0xfe80)
        }
    }
}

/// Parse `raw` and check it is an http(s) URL whose host resolves only to
/// public addresses.
async fn validate_target(raw: &str) -> AppResult<Url> {
    let parsed = Url::parse(raw).map_err(|_| AppError::Validation("Invalid URL".into()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Validation(
            "Only http/https URLs are supported".into(),
        ));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::Validation("URL has no host".into()))?;
    let port = parsed.port_or_known_default().unwrap_or(80);

    let blocked = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| AppError::Validation("Could not resolve URL host".into()))?
        .any(|addr| is_private_ip(addr.ip()));

    if blocked {
        return Err(AppError::Validation(
            "URL resolves to a private or reserved address".into(),
        ));
    }

    Ok(parsed)
}

// ── Fetching ───────────────────────────────────────────────────────────────

/// Client for preview fetches. Redirects are followed by [`fetch_page`] so
/// every hop goes through [`validate_target`].
pub fn preview_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(FETCH_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = ?e, "Falling back to default preview client");
            reqwest::Client::new()
        })
}

fn scrape_failed(e: impl std::fmt::Debug, url: &Url) -> AppError {
    tracing::warn!(error = ?e, url = %url, "Link preview fetch failed");
    AppError::Upstream("scrape failed".into())
}

/// GET `start` and return at most [`PREVIEW_BODY_LIMIT`] bytes of its body.
///
/// `start` must already be validated. Each redirect target is validated
/// before it is requested, up to [`MAX_REDIRECTS`] hops.
pub async fn fetch_page(client: &reqwest::Client, start: Url) -> AppResult<String> {
    let mut target = start;

    for _ in 0..=MAX_REDIRECTS {
        let mut response = client
            .get(target.clone())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| scrape_failed(e, &target))?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| scrape_failed("redirect without location", &target))?;
            let next = target
                .join(location)
                .map_err(|e| scrape_failed(e, &target))?;
            target = validate_target(next.as_str()).await?;
            continue;
        }

        if !status.is_success() {
            return Err(scrape_failed(status, &target));
        }

        let mut body: Vec<u8> = Vec::new();
        while body.len() < PREVIEW_BODY_LIMIT {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => return Err(scrape_failed(e, &target)),
            }
        }
        body.truncate(PREVIEW_BODY_LIMIT);

        return Ok(String::from_utf8_lossy(&body).into_owned());
    }

    Err(scrape_failed("too many redirects", &target))
}

// ── OG parsing ─────────────────────────────────────────────────────────────

/// Full-parse extraction of the preview fields. `<title>` stands in for a
/// missing `og:title`, `meta[name=description]` for `og:description` and
/// the hostname for `og:site_name`.
pub fn extract_og_data(html: &str, page_url: &str) -> LinkPreviewDto {
    let document = Html::parse_document(html);

    let title = meta_content(&document, "property", "og:title").or_else(|| title_tag(&document));
    let description = meta_content(&document, "property", "og:description")
        .or_else(|| meta_content(&document, "name", "description"));
    let image = meta_content(&document, "property", "og:image");
    let site_name = meta_content(&document, "property", "og:site_name").or_else(|| {
        Url::parse(page_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    });

    LinkPreviewDto {
        url: page_url.to_string(),
        title,
        description,
        image,
        site_name,
    }
}

fn meta_content(doc: &Html, attr: &str, value: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[{attr}="{value}"]"#)).ok()?;
    doc.select(&selector)
        .find_map(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn title_tag(doc: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    doc.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

// ── Cache ──────────────────────────────────────────────────────────────────

fn cached(cache: &LinkPreviewCache, url: &str) -> AppResult<Option<LinkPreviewDto>> {
    let cache = cache.lock().map_err(|_| AppError::Internal)?;
    Ok(cache
        .get(url)
        .filter(|(_, cached_at)| cached_at.elapsed() < CACHE_TTL)
        .map(|(dto, _)| dto.clone()))
}

fn remember(cache: &LinkPreviewCache, dto: &LinkPreviewDto) -> AppResult<()> {
    let mut cache = cache.lock().map_err(|_| AppError::Internal)?;
    cache.retain(|_, (_, cached_at)| cached_at.elapsed() < CACHE_TTL);
    cache.insert(dto.url.clone(), (dto.clone(), Instant::now()));
    Ok(())
}

// ── Handler ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LinkPreviewQuery {
    pub url: String,
}

/// GET /v1/links/preview?url=<encoded-url>
///
/// Prefills the link editor with the page's Open Graph metadata.
pub async fn get_link_preview(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<LinkPreviewQuery>,
) -> AppResult<Json<LinkPreviewDto>> {
    let target = validate_target(&params.url).await?;

    if let Some(dto) = cached(&state.link_preview_cache, &params.url)? {
        return Ok(Json(dto));
    }

    let html = fetch_page(&state.http_client, target).await?;

    let dto = extract_og_data(&html, &params.url);
    remember(&state.link_preview_cache, &dto)?;

    Ok(Json(dto))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_ranges_are_blocked() {
        for ip in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.0.10",
            "169.254.1.1",
            "0.0.0.0",
            "::1",
            "fd00::1",
            "fe80::1",
        ] {
            assert!(is_private_ip(ip.parse().unwrap()), "{ip} should be private");
        }
    }

    #[test]
    fn public_addresses_are_allowed() {
        for ip in ["8.8.8.8", "172.32.0.1", "2606:4700:4700::1111"] {
            assert!(!is_private_ip(ip.parse().unwrap()), "{ip} should be public");
        }
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        assert!(matches!(
            validate_target("ftp://example.com/file").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn rejects_loopback_target() {
        assert!(matches!(
            validate_target("http://127.0.0.1:8080/").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn public_ip_literal_is_accepted() {
        let url = validate_target("http://8.8.8.8/page").await.unwrap();
        assert_eq!(url.host_str(), Some("8.8.8.8"));
    }

    async fn serve(app: axum::Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    #[tokio::test]
    async fn redirect_hops_are_validated() {
        use axum::{response::Redirect, routing::get};

        let base = serve(
            axum::Router::new()
                .route("/absolute", get(|| async { Redirect::temporary("http://127.0.0.1:9/admin") }))
                .route("/relative", get(|| async { Redirect::permanent("/internal") })),
        )
        .await;

        for path in ["absolute", "relative"] {
            let result = fetch_page(&preview_client(), base.join(path).unwrap()).await;
            assert!(
                matches!(result, Err(AppError::Validation(_))),
                "{path} redirect must be refused"
            );
        }
    }

    #[tokio::test]
    async fn error_status_is_a_scrape_failure() {
        use axum::{http::StatusCode, routing::get};

        let base = serve(
            axum::Router::new().route("/gone", get(|| async { (StatusCode::NOT_FOUND, "gone") })),
        )
        .await;

        let result = fetch_page(&preview_client(), base.join("gone").unwrap()).await;
        assert!(matches!(result, Err(AppError::Upstream(_))));
    }

    #[tokio::test]
    async fn page_body_is_capped() {
        use axum::routing::get;

        let base = serve(axum::Router::new().route(
            "/huge",
            get(|| async { "a".repeat(PREVIEW_BODY_LIMIT + 100_000) }),
        ))
        .await;

        let html = fetch_page(&preview_client(), base.join("huge").unwrap())
            .await
            .unwrap();
        assert_eq!(html.len(), PREVIEW_BODY_LIMIT);
    }

    #[test]
    fn extracts_recipe_page_preview() {
        let html = r#"<html><head>
            <title>Crêpes faciles - Marmiton</title>
            <meta property="og:title" content="Pâte à crêpes"/>
            <meta name="description" content="La recette inratable"/>
            <meta property="og:image" content="https://img.example.fr/crepes.jpg"/>
        </head></html>"#;
        let dto = extract_og_data(html, "https://www.marmiton.org/recettes/crepes");
        assert_eq!(dto.title.as_deref(), Some("Pâte à crêpes"));
        assert_eq!(dto.description.as_deref(), Some("La recette inratable"));
        assert_eq!(dto.image.as_deref(), Some("https://img.example.fr/crepes.jpg"));
        assert_eq!(dto.site_name.as_deref(), Some("www.marmiton.org"));
    }

    #[test]
    fn falls_back_to_title_tag_and_ignores_blank_og() {
        let html = r#"<html><head>
            <title> Parc de la Tête d'Or </title>
            <meta property="og:title" content="   "/>
        </head></html>"#;
        let dto = extract_og_data(html, "https://lyon.fr/parc");
        assert_eq!(dto.title.as_deref(), Some("Parc de la Tête d'Or"));
        assert!(dto.image.is_none());
    }

    #[test]
    fn cache_serves_only_remembered_urls() {
        let cache = LinkPreviewCache::default();
        let dto = extract_og_data("<html><title>Zoo</title></html>", "https://zoo.example.fr");
        remember(&cache, &dto).unwrap();

        let hit = cached(&cache, "https://zoo.example.fr").unwrap().unwrap();
        assert_eq!(hit.title.as_deref(), Some("Zoo"));
        assert!(cached(&cache, "https://autre.example.fr").unwrap().is_none());
    }
}
