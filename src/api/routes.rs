use super::{error_response, AppState};
use crate::errors::PipelineError;
use crate::models::{BrandAnalysis, BrandCard, CompetitorAnalysis, CompetitorCandidate, Kernel};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/brand-summary", post(brand_summary))
        .route("/v1/competitors", post(competitors))
        .route("/v1/competitors/analyze", post(competitors_analyze))
        .route("/v1/kernel", post(kernel))
        .route("/health", get(health))
        .route("/health/ready", get(health_ready))
        .route("/health/live", get(health_live))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// `run_id`s are always `run_` followed by one or more lowercase hex digits or dashes
/// (the textual form of a UUIDv4, as produced by `RunStore::create`).
fn validate_run_id(run_id: &str) -> Result<(), PipelineError> {
    let rest = run_id.strip_prefix("run_").filter(|rest| !rest.is_empty());
    let well_formed = rest
        .map(|rest| rest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c) || c == '-'))
        .unwrap_or(false);
    if well_formed {
        Ok(())
    } else {
        Err(PipelineError::Validation("run_id is not a well-formed identifier".to_string()))
    }
}

#[derive(Serialize)]
struct ResponseMeta {
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    timestamp: chrono::DateTime<Utc>,
}

impl ResponseMeta {
    fn since(started: Instant) -> Self {
        Self {
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Deserialize)]
struct BrandSummaryRequest {
    #[serde(rename = "brandUrl")]
    brand_url: String,
}

#[derive(Serialize)]
struct BrandSummaryResponse {
    #[serde(rename = "runId")]
    run_id: String,
    brand: BrandAnalysis,
    #[serde(rename = "brandCard")]
    brand_card: BrandCard,
    meta: ResponseMeta,
}

async fn brand_summary(
    State(state): State<AppState>,
    Json(req): Json<BrandSummaryRequest>,
) -> Response {
    if req.brand_url.trim().is_empty() {
        return error_response(PipelineError::Validation("brandUrl is required".to_string()));
    }
    let started = Instant::now();
    match state.brand_summary.run(&req.brand_url).await {
        Ok((run, card)) => {
            let brand = run.brand.expect("brand_summary always populates run.brand");
            Json(BrandSummaryResponse {
                run_id: run.run_id,
                brand,
                brand_card: card,
                meta: ResponseMeta::since(started),
            })
            .into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct CompetitorsRequest {
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(rename = "brandDomain")]
    brand_domain: Option<String>,
}

#[derive(Serialize)]
struct CompetitorsResponse {
    #[serde(rename = "runId")]
    run_id: String,
    competitors: Vec<CompetitorCandidate>,
    meta: ResponseMeta,
}

async fn competitors(State(state): State<AppState>, Json(req): Json<CompetitorsRequest>) -> Response {
    if let Err(e) = validate_run_id(&req.run_id) {
        return error_response(e);
    }
    let started = Instant::now();
    match state
        .competitors
        .run(&req.run_id, req.brand_domain.as_deref())
        .await
    {
        Ok(competitors) => Json(CompetitorsResponse {
            run_id: req.run_id,
            competitors,
            meta: ResponseMeta::since(started),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct CompetitorsAnalyzeRequest {
    #[serde(rename = "runId")]
    run_id: String,
}

#[derive(Serialize)]
struct CompetitorsAnalyzeResponse {
    #[serde(rename = "runId")]
    run_id: String,
    competitors: Vec<CompetitorAnalysis>,
    meta: ResponseMeta,
}

async fn competitors_analyze(
    State(state): State<AppState>,
    Json(req): Json<CompetitorsAnalyzeRequest>,
) -> Response {
    if let Err(e) = validate_run_id(&req.run_id) {
        return error_response(e);
    }
    let started = Instant::now();
    match state.competitors_analyze.run(&req.run_id).await {
        Ok(competitors) => Json(CompetitorsAnalyzeResponse {
            run_id: req.run_id,
            competitors,
            meta: ResponseMeta::since(started),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct KernelRequest {
    #[serde(rename = "runId")]
    run_id: String,
}

#[derive(Serialize)]
struct KernelResponse {
    #[serde(rename = "runId")]
    run_id: String,
    kernel: Kernel,
    meta: ResponseMeta,
}

async fn kernel(State(state): State<AppState>, Json(req): Json<KernelRequest>) -> Response {
    if let Err(e) = validate_run_id(&req.run_id) {
        return error_response(e);
    }
    let started = Instant::now();
    match state.kernel.run(&req.run_id).await {
        Ok(kernel) => Json(KernelResponse {
            run_id: req.run_id,
            kernel,
            meta: ResponseMeta::since(started),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn health_ready(State(state): State<AppState>) -> Response {
    match state.run_store.count() {
        Ok(_) => (axum::http::StatusCode::OK, "ready").into_response(),
        Err(_) => (axum::http::StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response(),
    }
}

async fn health_live() -> &'static str {
    "alive"
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}
