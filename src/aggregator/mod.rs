//! Concurrent fan-out over the configured sources, merge and enrichment.
//!
//! # Pipeline
//!
//! 1. Run every source through the pagination driver, at most
//!    `max_concurrency` at a time.
//! 2. Merge successful runs in source priority order; the first record seen
//!    for a normalised link wins, later duplicates are dropped.
//! 3. Fail with [`AppError::AllSourcesFailed`] only if no source succeeded.
//! 4. Attach extracted content per unique link. A failed extraction leaves
//!    `content` empty and never removes the record.
//!
//! The request deadline arrives as a [`CancellationToken`]. Sources still
//! running when it fires return what they already fetched, and enrichment
//! is skipped.

pub mod dedup;

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{AppError, SourceError};
use crate::extract::{ContentExtractor, Extractor};
use crate::fetch::build_client;
use crate::pagination::{PageLimits, paginate};
use crate::sources::{Source, SourceAdapter, SourceKind, SourceQuery};

pub use dedup::{EnrichedResult, ResultSet, normalize_link};

/// Limits shared by every request an aggregator serves.
#[derive(Debug, Clone, Copy)]
pub struct AggregatorLimits {
    pub page_ceiling: u32,
    pub max_results_per_source: usize,
    pub max_concurrency: usize,
}

impl AggregatorLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_ceiling: config.max_pages,
            max_results_per_source: config.max_results_per_source,
            max_concurrency: config.max_concurrency,
        }
    }
}

/// Outcome of one aggregation.
#[derive(Debug)]
pub struct Aggregation {
    pub results: Vec<EnrichedResult>,
    /// Sources that completed, in priority order.
    pub sources_used: Vec<SourceKind>,
    pub failures: Vec<(SourceKind, SourceError)>,
}

pub struct Aggregator<S = Source, E = Extractor> {
    sources: Vec<S>,
    extractor: Option<E>,
    limits: AggregatorLimits,
}

impl Aggregator {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let client = build_client(config)?;
        let sources = Source::from_config(config, &client);
        if sources.is_empty() {
            return Err(AppError::Config("no usable sources configured".into()));
        }
        let extractor = Extractor::from_config(config, &client);

        tracing::info!(
            sources = ?sources.iter().map(|s| s.kind()).collect::<Vec<_>>(),
            enrichment = extractor.as_ref().map_or("off", Extractor::name),
            "aggregator ready"
        );

        Ok(Self::new(sources, extractor, AggregatorLimits::from_config(config)))
    }
}

impl<S: SourceAdapter, E: ContentExtractor> Aggregator<S, E> {
    /// Sources are reordered by priority; equal kinds keep their order.
    pub fn new(mut sources: Vec<S>, extractor: Option<E>, limits: AggregatorLimits) -> Self {
        sources.sort_by_key(|source| source.kind());
        Self {
            sources,
            extractor,
            limits,
        }
    }

    pub async fn aggregate(
        &self,
        query: &SourceQuery,
        max_pages: u32,
        cancel: &CancellationToken,
    ) -> Result<Aggregation, AppError> {
        let page_limits = PageLimits {
            max_pages,
            ceiling: self.limits.page_ceiling,
            max_results: self.limits.max_results_per_source,
        };

        // Completion order is irrelevant: outcomes land in their priority slot.
        let mut outcomes: Vec<Option<Result<_, SourceError>>> =
            self.sources.iter().map(|_| None).collect();
        let mut runs = stream::iter(0..self.sources.len())
            .map(|slot| {
                let source = &self.sources[slot];
                async move { (slot, paginate(source, query, page_limits, cancel).await) }
            })
            .buffer_unordered(self.limits.max_concurrency.max(1));
        while let Some((slot, outcome)) = runs.next().await {
            outcomes[slot] = Some(outcome);
        }

        let mut merged = ResultSet::new();
        let mut sources_used = Vec::new();
        let mut failures = Vec::new();

        for (source, outcome) in self.sources.iter().zip(outcomes) {
            let kind = source.kind();
            match outcome.unwrap_or(Err(SourceError::Cancelled)) {
                Ok(records) => {
                    let fetched = records.len();
                    let mut kept = 0;
                    for record in records {
                        if merged.insert(record) {
                            kept += 1;
                        }
                    }
                    tracing::debug!(source = %kind, fetched, kept, "source merged");
                    sources_used.push(kind);
                }
                Err(err) => {
                    tracing::warn!(source = %kind, error = %err, "source failed");
                    failures.push((kind, err));
                }
            }
        }

        if sources_used.is_empty() {
            if failures.iter().any(|(_, err)| *err == SourceError::Cancelled) {
                return Err(AppError::Timeout);
            }
            let reasons = failures
                .iter()
                .map(|(kind, err)| format!("{kind}: {err}"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AppError::AllSourcesFailed(if reasons.is_empty() {
                "no sources configured".to_string()
            } else {
                reasons
            }));
        }

        if let Some(extractor) = &self.extractor {
            self.enrich(extractor, &mut merged, cancel).await;
        }

        Ok(Aggregation {
            results: merged.into_vec(),
            sources_used,
            failures,
        })
    }

    async fn enrich(&self, extractor: &E, merged: &mut ResultSet, cancel: &CancellationToken) {
        if cancel.is_cancelled() || merged.is_empty() {
            return;
        }

        let links: Vec<String> = merged.iter().map(|r| r.result.link.clone()).collect();
        let extracted: HashMap<String, String> = stream::iter(links)
            .map(|link| async move {
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(SourceError::Cancelled),
                    result = extractor.extract(&link) => result,
                };
                (link, outcome)
            })
            .buffer_unordered(self.limits.max_concurrency.max(1))
            .filter_map(|(link, outcome)| async move {
                match outcome {
                    Ok(content) => Some((normalize_link(&link), content)),
                    Err(err) => {
                        tracing::warn!(%link, error = %err, "enrichment failed, returning record without content");
                        None
                    }
                }
            })
            .collect()
            .await;

        tracing::debug!(enriched = extracted.len(), total = merged.len(), "enrichment finished");

        for record in merged.iter_mut() {
            record.content = extracted.get(&normalize_link(&record.result.link)).cloned();
        }
    }
}
