//! Brand intelligence pipeline service.
//! Scrapes a brand's site, analyzes it and its competitors with an LLM, and
//! synthesizes a positioning kernel, gated through an explicit run/phase model.

mod api;
mod middleware;

use anyhow::Context;
use axum::middleware as axum_mw;
use axum::Router;
use brandkernel_core::cache::TwoTierCache;
use brandkernel_core::config::Config;
use brandkernel_core::evidence::EvidenceValidator;
use brandkernel_core::llm::LlmGateway;
use brandkernel_core::observability;
use brandkernel_core::phases::{BrandSummaryPhase, CompetitorsAnalyzePhase, CompetitorsPhase, KernelPhase};
use brandkernel_core::pool::BrowserPool;
use brandkernel_core::run_store::RunStore;
use brandkernel_core::scraper::Scraper;
use metrics_exporter_prometheus::PrometheusBuilder;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::middleware::auth::{require_api_key, ApiKeyState};
use crate::middleware::rate_limit::{RateLimitConfig, RateLimitLayer};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brandkernel_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Arc::new(Config::from_env().context("loading configuration")?);

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("installing metrics recorder")?;

    let pool = BrowserPool::init(config.browser_pool_size)
        .await
        .map_err(|e| anyhow::anyhow!("browser pool init failed: {e}"))?;

    let sqlite_conn = Connection::open(&config.sqlite_path)?;
    sqlite_conn.pragma_update(None, "journal_mode", "WAL").ok();
    let sqlite_conn = Arc::new(Mutex::new(sqlite_conn));

    let cache = TwoTierCache::new(&config.redis_url, sqlite_conn.clone()).await?;
    let run_store = Arc::new(RunStore::new(sqlite_conn, config.run_expiration_days)?);

    let scraper = Arc::new(Scraper::new(
        pool,
        cache,
        config.scrape_concurrency,
        config.cache_ttl_scraping,
    )?);
    let llm = Arc::new(LlmGateway::new(&config.openai_api_key, config.openai_timeout));
    let evidence = Arc::new(EvidenceValidator::new()?);

    let brand_summary = Arc::new(BrandSummaryPhase::new(
        scraper.clone(),
        llm.clone(),
        evidence.clone(),
        run_store.clone(),
    ));
    let competitors = Arc::new(CompetitorsPhase::new(llm.clone(), run_store.clone()));
    let competitors_analyze = Arc::new(CompetitorsAnalyzePhase::new(
        scraper.clone(),
        llm.clone(),
        evidence.clone(),
        run_store.clone(),
    ));
    let kernel = Arc::new(KernelPhase::new(llm.clone(), run_store.clone()));

    let state = AppState {
        config: config.clone(),
        run_store: run_store.clone(),
        brand_summary,
        competitors,
        competitors_analyze,
        kernel,
        metrics_handle,
    };

    spawn_reaper(run_store.clone());
    spawn_active_runs_gauge(run_store.clone());

    let rate_limiter = RateLimitLayer::new(RateLimitConfig {
        max_requests: config.rate_limit_max,
        window: std::time::Duration::from_secs(60),
        burst: config.rate_limit_max / 4,
    });
    spawn_rate_limit_cleanup(rate_limiter.clone());

    let api_key_state = ApiKeyState {
        expected: Arc::new(config.api_key.clone()),
    };

    let protected = api::routes::router(state.clone()).route_layer(axum_mw::from_fn_with_state(
        api_key_state,
        require_api_key,
    ));

    let app = Router::new()
        .merge(protected)
        .layer(axum_mw::from_fn_with_state(rate_limiter, crate::middleware::rate_limit::rate_limit_middleware))
        .layer(axum::middleware::from_fn(crate::middleware::logging::request_logging_simple))
        .layer(axum_mw::from_fn_with_state(run_store.clone(), crate::middleware::api_metrics::record_api_call))
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "brand intelligence pipeline listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}

fn spawn_reaper(run_store: Arc<RunStore>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            ticker.tick().await;
            if let Err(e) = run_store.reap() {
                tracing::warn!(error = %e, "run reap pass failed");
            }
        }
    });
}

fn spawn_active_runs_gauge(run_store: Arc<RunStore>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            ticker.tick().await;
            match run_store.count() {
                Ok(count) => observability::active_runs(count),
                Err(e) => tracing::warn!(error = %e, "active run count failed"),
            }
        }
    });
}

fn spawn_rate_limit_cleanup(limiter: RateLimitLayer) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(120));
        loop {
            ticker.tick().await;
            limiter.cleanup();
        }
    });
}
