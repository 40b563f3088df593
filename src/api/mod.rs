//! HTTP API surface.
//! Mission: thin axum handlers over the phase orchestrators; all business logic
//! lives in `phases`, `scraper`, `cache`, `evidence`, and `llm`.

pub mod routes;

use crate::config::Config;
use crate::errors::{render_error, PipelineError};
use crate::phases::{BrandSummaryPhase, CompetitorsAnalyzePhase, CompetitorsPhase, KernelPhase};
use crate::run_store::RunStore;
use axum::response::Response;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub run_store: Arc<RunStore>,
    pub brand_summary: Arc<BrandSummaryPhase>,
    pub competitors: Arc<CompetitorsPhase>,
    pub competitors_analyze: Arc<CompetitorsAnalyzePhase>,
    pub kernel: Arc<KernelPhase>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

/// Render a `PipelineError` with a fresh correlation id, for handlers that don't
/// already have one threaded through request middleware.
pub fn error_response(err: PipelineError) -> Response {
    render_error(&err, &Uuid::new_v4().to_string())
}
