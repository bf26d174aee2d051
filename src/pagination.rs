//! Sequential page driver for a single adapter.

use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::sources::{RawResult, SourceAdapter, SourceQuery};

/// Bounds applied to one adapter run.
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    /// Pages asked for by the request.
    pub max_pages: u32,
    /// Configured hard ceiling, applied whatever the request says.
    pub ceiling: u32,
    /// Records kept per adapter.
    pub max_results: usize,
}

impl PageLimits {
    pub fn page_budget(&self) -> u32 {
        self.max_pages.min(self.ceiling)
    }
}

/// Fetch pages `1..=budget` in order.
///
/// Stops at the first empty page, at the first failure, or when
/// `max_results` records are held. A failure on page 1 (or cancellation
/// before anything arrived) fails the adapter; later failures and
/// cancellation keep the pages already fetched.
pub async fn paginate<A: SourceAdapter>(
    adapter: &A,
    query: &SourceQuery,
    limits: PageLimits,
    cancel: &CancellationToken,
) -> Result<Vec<RawResult>, SourceError> {
    let source = adapter.kind();
    let mut collected: Vec<RawResult> = Vec::new();

    for page in 1..=limits.page_budget() {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = adapter.fetch(query, page) => Some(result),
        };

        match outcome {
            None if collected.is_empty() => return Err(SourceError::Cancelled),
            None => {
                tracing::debug!(%source, page, kept = collected.len(), "cancelled, keeping earlier pages");
                break;
            }
            Some(Err(err)) if page == 1 => return Err(err),
            Some(Err(err)) => {
                tracing::warn!(%source, page, error = %err, "page fetch failed, keeping earlier pages");
                break;
            }
            Some(Ok(records)) if records.is_empty() => {
                tracing::debug!(%source, page, "empty page, stopping");
                break;
            }
            Some(Ok(records)) => {
                tracing::debug!(%source, page, count = records.len(), "page fetched");
                collected.extend(records);
                if collected.len() >= limits.max_results {
                    collected.truncate(limits.max_results);
                    break;
                }
            }
        }
    }

    Ok(collected)
}
