//! API call metrics middleware.
//!
//! Records every request's endpoint, status, and latency into the run store's
//! `api_metrics` table. The API key is never stored in the clear — only a
//! SHA-256 fingerprint, so the metrics table can't leak a usable secret.

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use brandkernel_core::helpers::hash_url;
use brandkernel_core::run_store::RunStore;
use std::sync::Arc;
use std::time::Instant;

pub async fn record_api_call(
    State(run_store): State<Arc<RunStore>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let fingerprint = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(hash_url);

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    run_store.record_api_call(
        &path,
        response.status().as_u16(),
        elapsed.as_millis() as u64,
        fingerprint.as_deref(),
    );

    response
}
