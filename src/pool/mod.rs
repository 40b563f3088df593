//! Browser pool resource manager.
//! Mission: hand out a bounded set of reusable headless-browser workers, one at
//! a time, with FIFO fairness and leak-safe release.

mod resource_pool;

use crate::observability;
use playwright::api::{Browser, BrowserContext, DocumentLoadState, Page, Playwright, Viewport};
use resource_pool::ResourcePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub use resource_pool::{PoolError, PoolStats};

const VIEWPORT_WIDTH: i32 = 1280;
const VIEWPORT_HEIGHT: i32 = 720;
const USER_AGENT: &str =
    "Mozilla/5.0 (compatible; BrandKernelBot/1.0; +https://brandkernel.invalid/bot)";

struct Worker {
    id: usize,
    browser: Browser,
}

/// A bounded pool of headless Chromium workers.
pub struct BrowserPool {
    inner: Arc<ResourcePool<Worker>>,
    // Kept alive for the lifetime of the pool: dropping it tears down every
    // browser it launched.
    _driver: Arc<tokio::sync::Mutex<Option<Playwright>>>,
}

/// A temporary exclusive claim on one pool worker.
///
/// Dropping a `Lease` without calling [`release`](Lease::release) still returns the
/// worker to the free set (via the underlying `ResourcePool`'s own `Drop`), but skips
/// closing its last `Context` — callers should always prefer an explicit `release`.
pub struct Lease {
    guard: resource_pool::Guard<Worker>,
    pool: Arc<ResourcePool<Worker>>,
}

impl BrowserPool {
    /// Launch `n` headless workers with sandbox/GPU disabled. Idempotent after
    /// first success; on any worker failing to launch, already-launched workers
    /// are torn down before returning `PoolError::Init`.
    pub async fn init(n: usize) -> Result<Self, PoolError> {
        let playwright = Playwright::initialize()
            .await
            .map_err(|e| PoolError::Init(format!("playwright init failed: {e}")))?;
        playwright
            .install_chromium()
            .map_err(|e| PoolError::Init(format!("chromium install failed: {e}")))?;
        let chromium = playwright.chromium();

        let mut launched = Vec::with_capacity(n);
        for id in 0..n {
            let result = chromium
                .launcher()
                .headless(true)
                .args(&["--no-sandbox".to_string(), "--disable-gpu".to_string()])
                .launch()
                .await;
            match result {
                Ok(browser) => launched.push(Worker { id, browser }),
                Err(e) => {
                    error!(worker_id = id, error = %e, "browser worker failed to launch");
                    for worker in launched {
                        let _ = worker.browser.close().await;
                    }
                    return Err(PoolError::Init(format!(
                        "worker {id} failed to launch: {e}"
                    )));
                }
            }
        }

        info!(count = n, "browser pool initialized");
        Ok(Self {
            inner: Arc::new(ResourcePool::new(launched)),
            _driver: Arc::new(tokio::sync::Mutex::new(Some(playwright))),
        })
    }

    /// Claim one worker, waiting up to `timeout` for one to free up.
    pub async fn acquire(&self, timeout: Duration) -> Result<Lease, PoolError> {
        let guard = self.inner.acquire(timeout).await?;
        let stats = self.inner.stats();
        observability::pool_stats(stats.total, stats.in_use, stats.available);
        Ok(Lease {
            guard,
            pool: self.inner.clone(),
        })
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    /// Tear every worker down. Idempotent; outstanding `acquire` calls fail with
    /// `PoolError::Closed`.
    pub async fn close(&self) {
        let workers = self.inner.close();
        for worker in workers {
            if let Err(e) = worker.browser.close().await {
                warn!(worker_id = worker.id, error = %e, "error closing browser worker");
            }
        }
        if let Some(driver) = self._driver.lock().await.take() {
            drop(driver);
        }
        let stats = self.inner.stats();
        observability::pool_stats(stats.total, stats.in_use, stats.available);
    }
}

impl Lease {
    /// Allocate a fresh isolated session with the fixed viewport and user agent.
    pub async fn new_context(&self) -> Result<BrowserContext, PoolError> {
        let browser = &self.guard.resource().browser;
        browser
            .context_builder()
            .viewport(Some(Viewport {
                width: VIEWPORT_WIDTH,
                height: VIEWPORT_HEIGHT,
            }))
            .user_agent(USER_AGENT)
            .build()
            .await
            .map_err(|e| PoolError::Context(e.to_string()))
    }

    /// Close `context`, then return the worker to the free set. Always call this
    /// instead of relying on `Drop` on a happy path — `Drop` is the fallback for
    /// panics and cancellation.
    pub async fn release(self, context: BrowserContext) {
        if let Err(e) = context.close().await {
            warn!(error = %e, "error closing browser context on release");
        }
        let pool = self.pool.clone();
        drop(self); // returns the worker to the pool via `Guard`'s own `Drop`.
        let stats = pool.stats();
        observability::pool_stats(stats.total, stats.in_use, stats.available);
    }
}

/// A fresh page navigated to `url`, waiting for the network-idle condition up to
/// `timeout`. Returns the page title and the extracted main-text body with
/// `<script>`/`<style>`/`<nav>`/`<footer>`/`<header>` subtrees stripped.
pub async fn load_page(
    context: &BrowserContext,
    url: &str,
    timeout: Duration,
) -> Result<(String, String), PoolError> {
    let page: Page = context
        .new_page()
        .await
        .map_err(|e| PoolError::Context(e.to_string()))?;

    page.goto_builder(url)
        .timeout(timeout.as_millis() as f64)
        .wait_until(DocumentLoadState::Networkidle)
        .goto()
        .await
        .map_err(|e| PoolError::Navigation(e.to_string()))?;

    let title = page
        .title()
        .await
        .map_err(|e| PoolError::Navigation(e.to_string()))?;

    let script = r#"
        () => {
            for (const sel of ['script', 'style', 'nav', 'footer', 'header']) {
                document.querySelectorAll(sel).forEach(el => el.remove());
            }
            return document.body ? document.body.innerText : '';
        }
    "#;
    let text: String = page
        .eval(script)
        .await
        .map_err(|e| PoolError::Navigation(e.to_string()))?;

    Ok((title, text))
}
