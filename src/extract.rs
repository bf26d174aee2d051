//! Content extraction used to enrich merged results.

use reqwest::Client;

use crate::config::{Config, EnrichmentMode};
use crate::error::SourceError;
use crate::fetch::{extract_body_text, fetch_html, truncate_chars};
use crate::sources::FirecrawlClient;

/// Upper bound on the `content` attached to a single result.
pub const MAX_CONTENT_CHARS: usize = 20_000;

pub trait ContentExtractor: Send + Sync {
    fn extract(
        &self,
        link: &str,
    ) -> impl std::future::Future<Output = Result<String, SourceError>> + Send;
}

#[derive(Clone)]
pub enum Extractor {
    Firecrawl(FirecrawlClient),
    /// Fetches the page itself and keeps its visible body text.
    Direct(Client),
}

impl Extractor {
    /// `None` when enrichment is off or cannot be served with the given keys.
    pub fn from_config(config: &Config, client: &Client) -> Option<Extractor> {
        let firecrawl = || {
            config.firecrawl_api_key.as_deref().map(|key| {
                Extractor::Firecrawl(FirecrawlClient::new(client.clone(), &config.firecrawl_base_url, key))
            })
        };

        match config.enrichment {
            EnrichmentMode::Off => None,
            EnrichmentMode::Direct => Some(Extractor::Direct(client.clone())),
            EnrichmentMode::Firecrawl | EnrichmentMode::Auto => firecrawl(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Extractor::Firecrawl(_) => "firecrawl",
            Extractor::Direct(_) => "direct",
        }
    }
}

impl ContentExtractor for Extractor {
    async fn extract(&self, link: &str) -> Result<String, SourceError> {
        let content = match self {
            Extractor::Firecrawl(firecrawl) => firecrawl.scrape(link).await?,
            Extractor::Direct(client) => {
                let html = fetch_html(client, link, link).await?;
                extract_body_text(&html)
                    .filter(|text| !text.is_empty())
                    .ok_or_else(|| SourceError::Parse(format!("no readable content at {link}")))?
            }
        };

        Ok(truncate_chars(content.trim(), MAX_CONTENT_CHARS))
    }
}
