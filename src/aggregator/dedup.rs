//! Link normalisation and the first-seen, link-unique result set.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::sources::RawResult;

/// Query parameters that never identify a page.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "msclkid",
    "ref",
];

/// Canonical form of a link, used as the deduplication key.
///
/// Scheme and host are lowercased, default ports, the fragment and known
/// tracking parameters are removed, the remaining query parameters are
/// sorted, and a trailing slash is stripped from any path other than `/`.
/// Unparseable input is only trimmed and lowercased.
pub fn normalize_link(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_lowercase();
    };

    // Parsing already dropped default ports.
    url.set_fragment(None);

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    url.to_string()
}

/// A merged record: the first-seen raw result plus optional extracted content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedResult {
    #[serde(flatten)]
    pub result: RawResult,
    pub content: Option<String>,
}

/// Results unique by normalised link, in insertion order.
#[derive(Debug, Default)]
pub struct ResultSet {
    results: Vec<EnrichedResult>,
    seen: HashSet<String>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `result` unless its normalised link is already present.
    pub fn insert(&mut self, result: RawResult) -> bool {
        if !self.seen.insert(normalize_link(&result.link)) {
            return false;
        }
        self.results.push(EnrichedResult {
            result,
            content: None,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnrichedResult> {
        self.results.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EnrichedResult> {
        self.results.iter_mut()
    }

    pub fn into_vec(self) -> Vec<EnrichedResult> {
        self.results
    }
}
