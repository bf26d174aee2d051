//! Target-domain site search.
//!
//! Runs the domain's own search page and harvests every on-domain link it
//! renders. Works on any site whose search results are plain anchors, at the
//! cost of also picking up navigation links.

use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use super::{RawResult, SourceAdapter, SourceKind, SourceQuery, absolutize};
use crate::error::SourceError;
use crate::fetch::{clean_inline, fetch_html, in_page_chrome};

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("anchor selector"));
static IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").expect("image selector"));

#[derive(Clone)]
pub struct CustomSource {
    client: Client,
    scheme: String,
    search_path: String,
}

impl CustomSource {
    pub fn new(client: Client, scheme: &str, search_path: &str) -> Self {
        Self {
            client,
            scheme: scheme.to_string(),
            search_path: search_path.to_string(),
        }
    }

    fn search_url(&self, query: &SourceQuery, page: u32) -> Result<Url, SourceError> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.keywords.as_bytes()).collect();
        let path = self
            .search_path
            .replace("{query}", &encoded)
            .replace("{page}", &page.to_string());
        let path = if path.starts_with('/') { path } else { format!("/{path}") };

        Url::parse(&format!("{}://{}{}", self.scheme, query.target_domain, path))
            .map_err(|e| SourceError::Parse(format!("invalid search URL for {}: {e}", query.target_domain)))
    }
}

impl SourceAdapter for CustomSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Custom
    }

    async fn fetch(&self, query: &SourceQuery, page: u32) -> Result<Vec<RawResult>, SourceError> {
        let url = self.search_url(query, page)?;
        tracing::trace!(%url, page, "custom domain search");

        let html = fetch_html(&self.client, url.as_str(), &query.target_domain).await?;
        parse_links(&html, &url, query)
    }
}

fn parse_links(html: &str, page_url: &Url, query: &SourceQuery) -> Result<Vec<RawResult>, SourceError> {
    let document = Html::parse_document(html);

    let mut results: Vec<RawResult> = Vec::new();
    for anchor in document.select(&ANCHOR) {
        if in_page_chrome(anchor) {
            continue;
        }
        let Some(link) = anchor
            .value()
            .attr("href")
            .and_then(|href| absolutize(page_url, href))
        else {
            continue;
        };
        if !query.is_on_domain(&link) || links_to_search_page(&link, page_url) {
            continue;
        }
        if results.iter().any(|r| r.link == link) {
            continue;
        }

        let mut title = clean_inline(&anchor.text().collect::<String>());
        if title.is_empty() {
            title = anchor
                .value()
                .attr("title")
                .map(clean_inline)
                .unwrap_or_default();
        }
        if title.is_empty() {
            continue;
        }

        let thumbnail = anchor
            .select(&IMAGE)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| absolutize(page_url, src));

        results.push(RawResult {
            title,
            link,
            thumbnail,
            description: None,
            source: SourceKind::Custom,
        });
    }

    tracing::debug!(count = results.len(), "custom domain links parsed");
    Ok(results)
}

/// Pager, sorting and filter links all point back at the search page itself.
fn links_to_search_page(link: &str, page_url: &Url) -> bool {
    Url::parse(link).is_ok_and(|url| url.path() == page_url.path())
}
