use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced to HTTP callers. Everything else is handled (or degraded)
/// before it reaches the response path.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("upstream LLM unavailable after {attempts} attempts")]
    UpstreamUnavailable { attempts: u32 },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            ApiError::UpstreamUnavailable { .. } => (StatusCode::BAD_GATEWAY, "upstream_unavailable"),
        };
        let body = Json(json!({
            "error": kind,
            "detail": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Failures of a single provider call. `is_transient` decides whether the
/// resilient client is allowed to retry.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider request timed out")]
    Timeout,
    #[error("provider rate limited the request")]
    RateLimited,
    #[error("provider returned status {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("provider response missing expected fields: {0}")]
    InvalidResponse(String),
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LlmError {
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Timeout | LlmError::RateLimited => true,
            LlmError::Upstream { status, .. } => *status >= 500,
            LlmError::Http(err) => err.is_timeout() || err.is_connect(),
            LlmError::InvalidResponse(_) => false,
        }
    }
}

/// Retry budget exhausted; carries the final provider error for logging.
#[derive(Debug, Error)]
#[error("retry budget exhausted after {attempts} attempts: {last_error}")]
pub struct UpstreamUnavailable {
    pub attempts: u32,
    pub last_error: LlmError,
}
