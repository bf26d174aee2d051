//! Firecrawl REST client: search as a primary source, scrape for enrichment.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{RawResult, SourceKind, SourceQuery, non_empty};
use crate::error::SourceError;
use crate::fetch::clean_inline;

const SEARCH_LIMIT: u32 = 10;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    limit: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'static str; 1],
    only_main_content: bool,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct ScrapedPage {
    #[serde(default)]
    markdown: Option<String>,
}

#[derive(Clone)]
pub struct FirecrawlClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl FirecrawlClient {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Domain-scoped search. Firecrawl has no result paging, so only page 1
    /// yields anything.
    pub async fn search(&self, query: &SourceQuery, page: u32) -> Result<Vec<RawResult>, SourceError> {
        if page > 1 {
            return Ok(Vec::new());
        }

        let site_query = query.site_query();
        let hits: Vec<SearchHit> = self
            .post(
                "/v1/search",
                &SearchRequest {
                    query: &site_query,
                    limit: SEARCH_LIMIT,
                },
            )
            .await?;

        let results: Vec<RawResult> = hits
            .into_iter()
            .filter(|hit| query.is_on_domain(&hit.url))
            .map(|hit| RawResult {
                title: hit
                    .title
                    .map(|t| clean_inline(&t))
                    .and_then(non_empty)
                    .unwrap_or_else(|| "Untitled Page".to_string()),
                link: hit.url,
                thumbnail: None,
                description: hit.description.map(|d| clean_inline(&d)).and_then(non_empty),
                source: SourceKind::Firecrawl,
            })
            .collect();

        tracing::debug!(count = results.len(), "Firecrawl search results");
        Ok(results)
    }

    /// Main-content markdown of a single page.
    pub async fn scrape(&self, link: &str) -> Result<String, SourceError> {
        let page: ScrapedPage = self
            .post(
                "/v1/scrape",
                &ScrapeRequest {
                    url: link,
                    formats: ["markdown"],
                    only_main_content: true,
                },
            )
            .await?;

        page.markdown
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| SourceError::Parse(format!("no markdown returned for {link}")))
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, SourceError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::from_status(status, "Firecrawl"));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Firecrawl response: {e}")))?;

        if !envelope.success {
            let reason = envelope.error.unwrap_or_else(|| "request was not successful".into());
            return Err(SourceError::Unavailable(format!("Firecrawl: {reason}")));
        }
        envelope
            .data
            .ok_or_else(|| SourceError::Parse("Firecrawl response has no data".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> FirecrawlClient {
        FirecrawlClient::new(Client::new(), &server.uri(), "fc-test")
    }

    #[tokio::test]
    async fn search_maps_hits_on_domain() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/search"))
            .and(header("Authorization", "Bearer fc-test"))
            .and(body_partial_json(serde_json::json!({"query": "laptops site:example.com"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": [
                    {"url": "https://example.com/a", "title": "Laptop A", "description": "Light"},
                    {"url": "https://example.com/b"},
                    {"url": "https://other.org/c", "title": "Other"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = client(&server)
            .search(&SourceQuery::new("laptops", "example.com"), 1)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Laptop A");
        assert_eq!(results[0].description.as_deref(), Some("Light"));
        assert_eq!(results[1].title, "Untitled Page");
        assert!(results.iter().all(|r| r.source == SourceKind::Firecrawl));
    }

    #[tokio::test]
    async fn search_beyond_first_page_is_empty_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let results = client(&server)
            .search(&SourceQuery::new("laptops", "example.com"), 2)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn scrape_returns_markdown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .and(body_partial_json(serde_json::json!({
                "url": "https://example.com/a",
                "formats": ["markdown"],
                "onlyMainContent": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"markdown": "# Laptop A\n\nSpecs", "metadata": {"title": "Laptop A"}}
            })))
            .mount(&server)
            .await;

        let markdown = client(&server).scrape("https://example.com/a").await.unwrap();
        assert_eq!(markdown, "# Laptop A\n\nSpecs");
    }

    #[tokio::test]
    async fn unsuccessful_envelope_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": "blocked by robots.txt"
            })))
            .mount(&server)
            .await;

        let err = client(&server).scrape("https://example.com/a").await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(ref m) if m.contains("robots")));
    }

    #[tokio::test]
    async fn rate_limit_status_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client(&server).scrape("https://example.com/a").await.unwrap_err();
        assert!(matches!(err, SourceError::RateLimited(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let err = client(&server).scrape("https://example.com/a").await.unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }
}
