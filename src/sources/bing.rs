//! Bing HTML search, scoped with `site:`.

use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use super::{RawResult, SourceAdapter, SourceKind, SourceQuery, absolutize, non_empty};
use crate::error::SourceError;
use crate::fetch::{clean_inline, fetch_html};

const RESULTS_PER_PAGE: u32 = 10;

static CONTAINER: Lazy<Selector> = Lazy::new(|| Selector::parse("#b_results").expect("container selector"));
static ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("li.b_algo").expect("item selector"));
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").expect("title selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("link selector"));
static SNIPPET: Lazy<Selector> = Lazy::new(|| Selector::parse(".b_caption p, .b_lineclamp2").expect("snippet selector"));
static THUMBNAIL: Lazy<Selector> = Lazy::new(|| Selector::parse(".cico img[src]").expect("thumbnail selector"));

#[derive(Clone)]
pub struct BingSource {
    client: Client,
    base_url: String,
}

impl BingSource {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, query: &SourceQuery, page: u32) -> Result<Url, SourceError> {
        // Bing's `first` is a 1-based result offset.
        let first = page
            .saturating_sub(1)
            .saturating_mul(RESULTS_PER_PAGE)
            .saturating_add(1);
        Url::parse_with_params(
            &format!("{}/search", self.base_url),
            &[
                ("q", query.site_query()),
                ("first", first.to_string()),
                ("form", "QBLH".to_string()),
                ("setlang", "en".to_string()),
            ],
        )
        .map_err(|e| SourceError::Parse(format!("invalid Bing base URL: {e}")))
    }
}

impl SourceAdapter for BingSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Bing
    }

    async fn fetch(&self, query: &SourceQuery, page: u32) -> Result<Vec<RawResult>, SourceError> {
        let url = self.search_url(query, page)?;
        tracing::trace!(page, "Bing search");

        let html = fetch_html(&self.client, url.as_str(), "Bing").await?;
        parse_bing_html(&html, &url, query)
    }
}

fn parse_bing_html(html: &str, page_url: &Url, query: &SourceQuery) -> Result<Vec<RawResult>, SourceError> {
    let document = Html::parse_document(html);
    if document.select(&CONTAINER).next().is_none() {
        return Err(SourceError::Parse("Bing page has no result container".into()));
    }

    let mut results = Vec::new();
    for item in document.select(&ITEM) {
        let Some(title_el) = item.select(&TITLE).next() else {
            continue;
        };
        let title = clean_inline(&title_el.text().collect::<String>());
        if title.is_empty() {
            continue;
        }

        let Some(link) = title_el
            .select(&LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| absolutize(page_url, href))
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
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| absolutize(page_url, src));

        results.push(RawResult {
            title,
            link,
            thumbnail,
            description,
            source: SourceKind::Bing,
        });
    }

    tracing::debug!(count = results.len(), "Bing results parsed");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MOCK_BING_HTML: &str = r#"<!DOCTYPE html>
<html><body>
<ol id="b_results">
<li class="b_algo">
  <div class="cico"><img src="/th?id=abc"></div>
  <h2><a href="https://example.com/laptops/a" h="ID=SERP">Laptop A</a></h2>
  <div class="b_caption"><p>Thin and light.</p></div>
</li>
<li class="b_algo">
  <h2><a href="https://www.example.com/laptops/b">Laptop B</a></h2>
</li>
<li class="b_algo">
  <h2><a href="https://elsewhere.net/c">Elsewhere</a></h2>
</li>
<li class="b_ans"><h2>People also ask</h2></li>
</ol>
</body></html>"#;

    fn query() -> SourceQuery {
        SourceQuery::new("laptops", "example.com")
    }

    #[test]
    fn parses_organic_results() {
        let page = Url::parse("https://www.bing.com/search?q=laptops").unwrap();
        let results = parse_bing_html(MOCK_BING_HTML, &page, &query()).unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].title, "Laptop A");
        assert_eq!(results[0].link, "https://example.com/laptops/a");
        assert_eq!(results[0].thumbnail.as_deref(), Some("https://www.bing.com/th?id=abc"));
        assert_eq!(results[0].description.as_deref(), Some("Thin and light."));
        assert_eq!(results[0].source, SourceKind::Bing);

        assert_eq!(results[1].link, "https://www.example.com/laptops/b");
        assert!(results[1].thumbnail.is_none());
    }

    #[test]
    fn missing_container_is_parse_error() {
        let page = Url::parse("https://www.bing.com/search").unwrap();
        let result = parse_bing_html("<html><body></body></html>", &page, &query());
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }

    #[test]
    fn search_url_uses_one_based_offset() {
        let source = BingSource::new(Client::new(), "https://www.bing.com/");
        let url = source.search_url(&query(), 3).unwrap();
        let first = url
            .query_pairs()
            .find(|(k, _)| k == "first")
            .map(|(_, v)| v.into_owned());
        assert_eq!(first.as_deref(), Some("21"));
        assert!(url.as_str().starts_with("https://www.bing.com/search?"));
    }

    #[test]
    fn search_url_offset_saturates_on_huge_page() {
        let source = BingSource::new(Client::new(), "https://www.bing.com");
        let url = source.search_url(&query(), u32::MAX).unwrap();
        let first = url
            .query_pairs()
            .find(|(k, _)| k == "first")
            .map(|(_, v)| v.into_owned());
        assert_eq!(first, Some(u32::MAX.to_string()));
    }

    #[tokio::test]
    async fn fetch_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "laptops site:example.com"))
            .and(query_param("first", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOCK_BING_HTML))
            .expect(1)
            .mount(&server)
            .await;

        let source = BingSource::new(Client::new(), &server.uri());
        let results = source.fetch(&query(), 1).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.source == SourceKind::Bing));
    }

    #[tokio::test]
    async fn fetch_reports_outage_as_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = BingSource::new(Client::new(), &server.uri());
        let result = source.fetch(&query(), 1).await;
        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }
}
