//! Google HTML search, scoped with `site:`.

use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use super::{RawResult, SourceAdapter, SourceKind, SourceQuery, absolutize, non_empty};
use crate::error::SourceError;
use crate::fetch::clean_inline;

const RESULTS_PER_PAGE: u32 = 10;

static CONTAINER: Lazy<Selector> = Lazy::new(|| Selector::parse("#search, #rso").expect("container selector"));
static ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("div.g").expect("item selector"));
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h3").expect("title selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("link selector"));
static SNIPPET: Lazy<Selector> = Lazy::new(|| Selector::parse(".VwiC3b").expect("snippet selector"));
static THUMBNAIL: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").expect("thumbnail selector"));

#[derive(Clone)]
pub struct GoogleSource {
    client: Client,
    base_url: String,
}

impl GoogleSource {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Zero-based offset of the first result on `page`.
fn result_offset(page: u32) -> u32 {
    page.saturating_sub(1).saturating_mul(RESULTS_PER_PAGE)
}

impl SourceAdapter for GoogleSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Google
    }

    async fn fetch(&self, query: &SourceQuery, page: u32) -> Result<Vec<RawResult>, SourceError> {
        let start = result_offset(page);
        tracing::trace!(page, start, "Google search");

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("q", query.site_query()),
                ("start", start.to_string()),
                ("num", RESULTS_PER_PAGE.to_string()),
                ("hl", "en".to_string()),
            ])
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        // Google answers suspected bots with a redirect to its captcha page.
        if response.url().path().starts_with("/sorry") {
            return Err(SourceError::RateLimited("Google served a captcha page".into()));
        }
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::from_status(status, "Google"));
        }

        let html = response.text().await?;
        parse_google_html(&html, &self.base_url, query)
    }
}

fn parse_google_html(
    html: &str,
    base_url: &str,
    query: &SourceQuery,
) -> Result<Vec<RawResult>, SourceError> {
    let document = Html::parse_document(html);
    if document.select(&CONTAINER).next().is_none() {
        return Err(SourceError::Parse("Google page has no result container".into()));
    }

    let base = Url::parse(base_url)
        .map_err(|e| SourceError::Parse(format!("invalid Google base URL: {e}")))?;

    let mut results = Vec::new();
    for item in document.select(&ITEM) {
        let Some(title_el) = item.select(&TITLE).next() else {
            continue;
        };
        let title = clean_inline(&title_el.text().collect::<String>());
        if title.is_empty() {
            continue;
        }

        let Some(link) = item
            .select(&LINK)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| resolve_link(&base, href))
        else {
            continue;
        };
        if !query.is_on_domain(&link) {
            continue;
        }

        let description = item
            .select(&SNIPPET)
            .next()
            .and_then(|el| non_empty(clean_inline(&el.text().collect::<String>())));
        let thumbnail = item
            .select(&THUMBNAIL)
            .filter_map(|img| img.value().attr("src"))
            .find_map(|src| absolutize(&base, src));

        results.push(RawResult {
            title,
            link,
            thumbnail,
            description,
            source: SourceKind::Google,
        });
    }

    tracing::debug!(count = results.len(), "Google results parsed");
    Ok(results)
}

/// Unwrap `/url?q=<target>` redirects and drop links back into Google.
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let absolute = Url::parse(&absolutize(base, href)?).ok()?;

    if absolute.host_str() == base.host_str() {
        if absolute.path() != "/url" {
            return None;
        }
        let target = absolute
            .query_pairs()
            .find(|(key, _)| key == "q" || key == "url")
            .map(|(_, value)| value.into_owned())?;
        return absolutize(base, &target).filter(|t| t.starts_with("http"));
    }

    Some(absolute.to_string())
}
