use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::response;

/// Failure of a single source adapter or of the content extractor.
///
/// These never reach the caller directly: the aggregator logs them and
/// only turns them into an [`AppError`] when every source failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("source rate limited: {0}")]
    RateLimited(String),

    #[error("unexpected source response: {0}")]
    Parse(String),

    #[error("source cancelled before completion")]
    Cancelled,
}

impl SourceError {
    /// Classify a non-success HTTP status returned by an upstream.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            SourceError::RateLimited(format!("{context} returned {status}"))
        } else {
            SourceError::Unavailable(format!("{context} returned {status}"))
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                SourceError::RateLimited(err.to_string())
            }
            _ if err.is_decode() => SourceError::Parse(err.to_string()),
            _ => SourceError::Unavailable(err.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("All sources failed: {0}")]
    AllSourcesFailed(String),

    #[error("Request timed out before any source completed")]
    Timeout,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::AllSourcesFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        response::error(status, self.to_string()).into_response()
    }
}

impl From<std::env::VarError> for AppError {
    fn from(err: std::env::VarError) -> Self {
        AppError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
