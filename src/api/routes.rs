use std::future::Future;
use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::api::models::{ResponseEnvelope, ScrapeRequest};
use crate::api::response;
use crate::error::{AppError, Result};

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/scrape", post(scrape_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn health_handler() -> impl IntoResponse {
    response::healthy()
}

async fn scrape_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    let validated = req.validate(state.config.max_pages)?;
    let query = validated.query;

    tracing::info!(
        keywords = %query.keywords,
        target_domain = %query.target_domain,
        max_pages = validated.max_pages,
        "processing scrape request"
    );
    let start_time = Instant::now();

    // The deadline cancels in-flight sources; whatever completed is returned.
    let cancel = CancellationToken::new();
    let outcome = with_deadline(
        state.aggregator.aggregate(&query, validated.max_pages, &cancel),
        state.config.request_timeout,
        &cancel,
    )
    .await;

    let elapsed = start_time.elapsed();
    match outcome {
        Ok(aggregation) => {
            tracing::info!(
                total_results = aggregation.results.len(),
                sources_used = ?aggregation.sources_used,
                failed_sources = aggregation.failures.len(),
                ?elapsed,
                "scrape request completed"
            );
            let envelope = ResponseEnvelope::new(
                aggregation.results,
                &query,
                aggregation.sources_used,
                elapsed,
            );
            Ok(response::success(envelope))
        }
        Err(err) => {
            tracing::error!(error = %err, ?elapsed, "scrape request failed");
            Err(err)
        }
    }
}

/// Drive `work` to completion, cancelling `cancel` once `timeout` has
/// elapsed. `work` is expected to observe the token and wind down.
/// Nothing is spawned, so dropping the returned future drops the timer too.
async fn with_deadline<F: Future>(work: F, timeout: Duration, cancel: &CancellationToken) -> F::Output {
    tokio::pin!(work);
    tokio::select! {
        output = &mut work => output,
        _ = tokio::time::sleep(timeout) => {
            tracing::warn!(?timeout, "request deadline reached, cancelling sources");
            cancel.cancel();
            work.await
        }
    }
}
