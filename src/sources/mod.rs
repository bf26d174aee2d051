//! Source adapters.
//!
//! Every adapter exposes the same contract, [`SourceAdapter::fetch`], which
//! returns one page of [`RawResult`]s for a query scoped to a target domain.
//! The set of adapters is closed: [`Source`] enumerates them and is built
//! from configuration.

pub mod bing;
pub mod custom;
pub mod firecrawl;
pub mod google;

use std::fmt;
use std::str::FromStr;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Config;
use crate::error::SourceError;

pub use bing::BingSource;
pub use custom::CustomSource;
pub use firecrawl::FirecrawlClient;
pub use google::GoogleSource;

/// Origin of a result. Declaration order is merge priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Google,
    Bing,
    Custom,
    Firecrawl,
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Google => "google",
            SourceKind::Bing => "bing",
            SourceKind::Custom => "custom",
            SourceKind::Firecrawl => "firecrawl",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceKind {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(SourceKind::Google),
            "bing" => Ok(SourceKind::Bing),
            "custom" => Ok(SourceKind::Custom),
            "firecrawl" => Ok(SourceKind::Firecrawl),
            other => Err(SourceError::Parse(format!("unknown source: {other}"))),
        }
    }
}

/// A single record emitted by an adapter. Never mutated after emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    pub title: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: SourceKind,
}

/// What an adapter is asked for. Shared by all pages of one request.
#[derive(Debug, Clone)]
pub struct SourceQuery {
    pub keywords: String,
    /// Bare host (optionally with port), no scheme and no trailing slash.
    pub target_domain: String,
}

impl SourceQuery {
    pub fn new(keywords: impl Into<String>, target_domain: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            target_domain: target_domain.into(),
        }
    }

    /// Search-engine query restricted to the target domain.
    pub fn site_query(&self) -> String {
        format!("{} site:{}", self.keywords, self.domain_host())
    }

    /// Host part of the target domain, lowercased and without any port.
    pub fn domain_host(&self) -> String {
        Url::parse(&format!("http://{}", self.target_domain))
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| self.target_domain.to_ascii_lowercase())
    }

    /// Whether `link` points at the target domain or one of its subdomains.
    pub fn is_on_domain(&self, link: &str) -> bool {
        let Ok(url) = Url::parse(link) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let domain = self.domain_host();
        host == domain || host.ends_with(&format!(".{domain}"))
    }
}

/// The contract every adapter implements.
///
/// `page` is 1-based. An adapter returns an empty page when it has nothing
/// more to offer; it does not track pagination state between calls.
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn fetch(
        &self,
        query: &SourceQuery,
        page: u32,
    ) -> impl std::future::Future<Output = Result<Vec<RawResult>, SourceError>> + Send;
}

/// Closed set of configured adapters.
#[derive(Clone)]
pub enum Source {
    Google(GoogleSource),
    Bing(BingSource),
    Custom(CustomSource),
    Firecrawl(FirecrawlClient),
}

impl Source {
    /// Instantiate the adapters named in `config.sources`, in priority order.
    pub fn from_config(config: &Config, client: &Client) -> Vec<Source> {
        let mut kinds = config.sources.clone();
        kinds.sort();

        kinds
            .into_iter()
            .filter_map(|kind| match kind {
                SourceKind::Google => Some(Source::Google(GoogleSource::new(
                    client.clone(),
                    &config.google_base_url,
                ))),
                SourceKind::Bing => Some(Source::Bing(BingSource::new(
                    client.clone(),
                    &config.bing_base_url,
                ))),
                SourceKind::Custom => Some(Source::Custom(CustomSource::new(
                    client.clone(),
                    &config.custom_scheme,
                    &config.custom_search_path,
                ))),
                SourceKind::Firecrawl => match &config.firecrawl_api_key {
                    Some(key) => Some(Source::Firecrawl(FirecrawlClient::new(
                        client.clone(),
                        &config.firecrawl_base_url,
                        key,
                    ))),
                    None => {
                        tracing::warn!("firecrawl source enabled without FIRECRAWL_API_KEY, skipping");
                        None
                    }
                },
            })
            .collect()
    }
}

impl SourceAdapter for Source {
    fn kind(&self) -> SourceKind {
        match self {
            Source::Google(_) => SourceKind::Google,
            Source::Bing(_) => SourceKind::Bing,
            Source::Custom(_) => SourceKind::Custom,
            Source::Firecrawl(_) => SourceKind::Firecrawl,
        }
    }

    async fn fetch(&self, query: &SourceQuery, page: u32) -> Result<Vec<RawResult>, SourceError> {
        match self {
            Source::Google(source) => source.fetch(query, page).await,
            Source::Bing(source) => source.fetch(query, page).await,
            Source::Custom(source) => source.fetch(query, page).await,
            Source::Firecrawl(source) => source.search(query, page).await,
        }
    }
}

/// Turn a possibly relative `href` into an absolute http(s) link.
pub(crate) fn absolutize(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:") || lowered.starts_with("mailto:") || lowered.starts_with("tel:") {
        return None;
    }

    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

pub(crate) fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_sort_by_priority() {
        let mut kinds = vec![SourceKind::Custom, SourceKind::Bing, SourceKind::Google];
        kinds.sort();
        assert_eq!(kinds, vec![SourceKind::Google, SourceKind::Bing, SourceKind::Custom]);
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SourceKind::Google).unwrap(), "\"google\"");
        assert_eq!("Firecrawl".parse::<SourceKind>().unwrap(), SourceKind::Firecrawl);
    }

    #[test]
    fn raw_result_omits_absent_optionals() {
        let result = RawResult {
            title: "Laptop A".into(),
            link: "https://example.com/a".into(),
            thumbnail: None,
            description: None,
            source: SourceKind::Google,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "Laptop A",
                "link": "https://example.com/a",
                "source": "google"
            })
        );
    }

    #[test]
    fn domain_matching_accepts_subdomains_only() {
        let query = SourceQuery::new("laptops", "example.com");
        assert!(query.is_on_domain("https://example.com/a"));
        assert!(query.is_on_domain("https://shop.Example.com/a"));
        assert!(!query.is_on_domain("https://notexample.com/a"));
        assert!(!query.is_on_domain("https://example.com.evil.io/"));
        assert!(!query.is_on_domain("/relative"));
    }

    #[test]
    fn domain_host_strips_port() {
        let query = SourceQuery::new("laptops", "127.0.0.1:8080");
        assert_eq!(query.domain_host(), "127.0.0.1");
        assert_eq!(query.site_query(), "laptops site:127.0.0.1");
    }

    #[test]
    fn absolutize_resolves_and_filters() {
        let base = Url::parse("https://example.com/search?q=x").unwrap();
        assert_eq!(
            absolutize(&base, "/items/1").as_deref(),
            Some("https://example.com/items/1")
        );
        assert_eq!(absolutize(&base, "#top"), None);
        assert_eq!(absolutize(&base, "javascript:void(0)"), None);
        assert_eq!(absolutize(&base, "mailto:a@example.com"), None);
        assert_eq!(absolutize(&base, "ftp://example.com/file"), None);
    }

    #[test]
    fn from_config_orders_and_skips_keyless_firecrawl() {
        let config = Config {
            sources: vec![SourceKind::Custom, SourceKind::Firecrawl, SourceKind::Google],
            ..Default::default()
        };
        let client = Client::new();
        let kinds: Vec<_> = Source::from_config(&config, &client)
            .iter()
            .map(|source| source.kind())
            .collect();
        assert_eq!(kinds, vec![SourceKind::Google, SourceKind::Custom]);
    }
}
