use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::aggregator::EnrichedResult;
use crate::error::{AppError, Result};
use crate::sources::{SourceKind, SourceQuery};

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    pub keywords: String,
    pub target_domain: String,
    /// Signed so that negative input is reported as a validation error.
    #[serde(default)]
    pub max_pages: Option<i64>,
}

/// A request that passed validation, ready for the aggregator.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub query: SourceQuery,
    pub max_pages: u32,
}

impl ScrapeRequest {
    /// Check shape and bounds. `ceiling` is both the upper bound and the
    /// default for `max_pages`.
    pub fn validate(&self, ceiling: u32) -> Result<ValidatedRequest> {
        let keywords = self.keywords.trim();
        if keywords.is_empty() {
            return Err(AppError::Validation("keywords must not be empty".into()));
        }

        let target_domain = normalize_domain(&self.target_domain)?;

        let max_pages = match self.max_pages {
            None => ceiling,
            Some(pages) if pages >= 1 && pages <= i64::from(ceiling) => pages as u32,
            Some(pages) => {
                return Err(AppError::Validation(format!(
                    "max_pages must be between 1 and {ceiling}, got {pages}"
                )));
            }
        };

        Ok(ValidatedRequest {
            query: SourceQuery::new(keywords, target_domain),
            max_pages,
        })
    }
}

/// Reduce user input such as `https://Example.com/shop/` to `example.com`.
fn normalize_domain(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let authority = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    if authority.is_empty() {
        return Err(AppError::Validation("target_domain must not be empty".into()));
    }

    let parsed = Url::parse(&format!("http://{authority}"))
        .map_err(|e| AppError::Validation(format!("invalid target_domain {raw:?}: {e}")))?;
    if parsed.host_str().is_none_or(str::is_empty) || !parsed.username().is_empty() {
        return Err(AppError::Validation(format!("invalid target_domain {raw:?}")));
    }

    Ok(authority)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub total_results: usize,
    pub keywords: String,
    pub target_domain: String,
    pub sources_used: Vec<SourceKind>,
    pub scraped_at: DateTime<Utc>,
    /// Seconds, rounded to two decimals.
    pub execution_time: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub results: Vec<EnrichedResult>,
    pub metadata: ResponseMetadata,
}

impl ResponseEnvelope {
    pub fn new(
        results: Vec<EnrichedResult>,
        query: &SourceQuery,
        sources_used: Vec<SourceKind>,
        elapsed: Duration,
    ) -> Self {
        let metadata = ResponseMetadata {
            total_results: results.len(),
            keywords: query.keywords.clone(),
            target_domain: query.target_domain.clone(),
            sources_used,
            scraped_at: Utc::now(),
            execution_time: (elapsed.as_secs_f64() * 100.0).round() / 100.0,
        };
        Self { results, metadata }
    }
}
