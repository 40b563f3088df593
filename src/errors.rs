//! Crate-wide error taxonomy.
//! Mission: one fixed code string per failure mode, each carrying its HTTP status.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub enum PipelineError {
    Validation(String),
    Unauthorized,
    RateLimitExceeded,
    LowConfidence { confidence: f64, invalid_citations: Value },
    InsufficientData,
    PrereqMissing { missing_slot: &'static str },
    OpenAiError(String),
    OpenAiTimeout,
    RequestTimeout,
    Internal(String),
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "VALIDATION_ERROR",
            PipelineError::Unauthorized => "UNAUTHORIZED",
            PipelineError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            PipelineError::LowConfidence { .. } => "LOW_CONFIDENCE",
            PipelineError::InsufficientData => "INSUFFICIENT_DATA",
            PipelineError::PrereqMissing { .. } => "UPSTREAM_ARTIFACT_MISSING",
            PipelineError::OpenAiError(_) => "OPENAI_ERROR",
            PipelineError::OpenAiTimeout => "OPENAI_TIMEOUT",
            PipelineError::RequestTimeout => "REQUEST_TIMEOUT",
            PipelineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::Unauthorized => StatusCode::UNAUTHORIZED,
            PipelineError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            PipelineError::LowConfidence { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::InsufficientData | PipelineError::PrereqMissing { .. } => {
                StatusCode::from_u16(424).unwrap()
            }
            PipelineError::OpenAiError(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::OpenAiTimeout => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::RequestTimeout => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            PipelineError::Validation(msg) => msg.clone(),
            PipelineError::Unauthorized => "missing or invalid API key".to_string(),
            PipelineError::RateLimitExceeded => "too many requests".to_string(),
            PipelineError::LowConfidence { confidence, .. } => {
                format!("adjusted confidence {confidence:.3} below threshold 0.6")
            }
            PipelineError::InsufficientData => "fewer than 3 pages survived the scrape".to_string(),
            PipelineError::PrereqMissing { missing_slot } => {
                format!("required upstream artifact '{missing_slot}' is missing")
            }
            PipelineError::OpenAiError(msg) => msg.clone(),
            PipelineError::OpenAiTimeout => "LLM call exceeded its deadline".to_string(),
            PipelineError::RequestTimeout => "request exceeded the end-to-end timeout".to_string(),
            PipelineError::Internal(msg) => msg.clone(),
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            PipelineError::LowConfidence { invalid_citations, .. } => {
                Some(invalid_citations.clone())
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for PipelineError {}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
    #[serde(rename = "correlationId")]
    correlation_id: String,
}

/// Render a `PipelineError` into the fixed `{ error, message, details?, correlationId }` envelope.
pub fn render_error(err: &PipelineError, correlation_id: &str) -> Response {
    let body = ErrorEnvelope {
        error: err.code(),
        message: err.message(),
        details: err.details(),
        correlation_id: correlation_id.to_string(),
    };
    (err.status(), Json(body)).into_response()
}

/// Extension point: a `PipelineError` with no request context attached yet renders with an
/// empty correlation id; handlers should prefer `render_error` once the request id is known.
impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        render_error(&self, "")
    }
}
