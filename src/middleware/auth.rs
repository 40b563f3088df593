//! API key authentication middleware.
//!
//! A single shared secret compared in constant time against the `X-API-Key` header.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use brandkernel_core::errors::{render_error, PipelineError};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiKeyState {
    pub expected: Arc<String>,
}

/// Compare two byte strings in constant time with respect to their content
/// (though not their length, which the caller reveals via response timing only
/// for keys short enough that it doesn't matter in practice).
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn require_api_key(
    State(state): State<ApiKeyState>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());

    let authorized = match provided {
        Some(key) => constant_time_eq(key.as_bytes(), state.expected.as_bytes()),
        None => false,
    };

    if authorized {
        next.run(request).await
    } else {
        render_error(&PipelineError::Unauthorized, &Uuid::new_v4().to_string())
    }
}
