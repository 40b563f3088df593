//! Site scraper.
//! Mission: turn one brand URL into a deduplicated set of page texts, backed by
//! the two-tier cache and a bounded pool of headless workers.

use crate::cache::TwoTierCache;
use crate::errors::PipelineError;
use crate::helpers::{canonicalize_url, dedupe_by_jaccard, extract_domain};
use crate::models::{Page, ScrapeMeta, ScrapeResult};
use crate::observability;
use crate::pool::{load_page, BrowserPool};
use chrono::Utc;
use futures_util::future::join_all;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const JACCARD_DEDUPE_THRESHOLD: f64 = 0.8;
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const PAGE_TIMEOUT: Duration = Duration::from_secs(15);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed set of candidate paths probed on every scrape. Not user-configurable:
/// the set is small and stable enough to live in code rather than the environment.
const CANDIDATE_PATHS: &[&str] = &[
    "",
    "/about",
    "/about-us",
    "/pricing",
    "/products",
    "/product",
    "/features",
    "/solutions",
    "/customers",
    "/case-studies",
    "/blog",
    "/contact",
    "/team",
    "/company",
    "/careers",
    "/faq",
    "/how-it-works",
    "/platform",
    "/enterprise",
    "/why-us",
];

pub struct Scraper {
    probe_client: Client,
    pool: BrowserPool,
    cache: TwoTierCache,
    concurrency: usize,
    cache_ttl: Duration,
}

impl Scraper {
    pub fn new(pool: BrowserPool, cache: TwoTierCache, concurrency: usize, cache_ttl: Duration) -> anyhow::Result<Self> {
        let probe_client = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            probe_client,
            pool,
            cache,
            concurrency,
            cache_ttl,
        })
    }

    pub async fn scrape(&self, input_url: &str) -> Result<ScrapeResult, PipelineError> {
        let started = Instant::now();
        let canonical = canonicalize_url(input_url)
            .map_err(|_| PipelineError::Validation("malformed or unsupported brand url".to_string()))?;
        let domain = extract_domain(&canonical)
            .ok_or_else(|| PipelineError::Validation("could not extract domain from brand url".to_string()))?;

        if let Some(cached) = self.cache.get(&canonical).await {
            return Ok(cached);
        }

        let candidates: Vec<String> = CANDIDATE_PATHS
            .iter()
            .map(|path| format!("{}{}", canonical.trim_end_matches('/'), path))
            .collect();

        let probe_checks = candidates.iter().map(|url| self.probe_one(url));
        let probe_results = join_all(probe_checks).await;
        let survived_probe: Vec<String> = candidates
            .iter()
            .zip(probe_results)
            .filter_map(|(url, ok)| if ok { Some(url.clone()) } else { None })
            .collect();

        if survived_probe.is_empty() {
            return Err(PipelineError::InsufficientData);
        }

        let mut pages = Vec::new();
        for batch in survived_probe.chunks(self.concurrency) {
            let fetches = batch.iter().map(|url| self.fetch_one(url));
            let results = join_all(fetches).await;
            for (url, result) in batch.iter().zip(results) {
                match result {
                    Ok(page) => pages.push(page),
                    Err(e) => debug!(url = %url, error = %e, "page fetch dropped"),
                }
            }
        }

        if pages.is_empty() {
            return Err(PipelineError::InsufficientData);
        }

        let pages_scraped = pages.len();
        let deduped = dedupe_by_jaccard(pages, JACCARD_DEDUPE_THRESHOLD, |p: &Page| p.text.as_str());

        let result = ScrapeResult {
            pages: deduped.clone(),
            meta: ScrapeMeta {
                input_url: canonical.clone(),
                domain: domain.clone(),
                candidates_discovered: candidates.len(),
                candidates_survived_probe: survived_probe.len(),
                pages_scraped,
                pages_after_dedupe: deduped.len(),
                duration_ms: started.elapsed().as_millis() as u64,
                captured_at: Utc::now(),
            },
        };

        self.cache.put(&canonical, &result, self.cache_ttl).await;
        observability::scraping_duration(domain, started.elapsed().as_millis() as u64);
        info!(url = %canonical, pages = result.pages.len(), "scrape complete");

        Ok(result)
    }

    async fn probe_one(&self, url: &str) -> bool {
        match self.probe_client.head(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "probe failed");
                false
            }
        }
    }

    async fn fetch_one(&self, url: &str) -> anyhow::Result<Page> {
        let lease = self.pool.acquire(ACQUIRE_TIMEOUT).await?;
        let context = lease.new_context().await?;
        let (title, text) = load_page(&context, url, PAGE_TIMEOUT).await?;
        lease.release(context).await;
        Ok(Page {
            url: url.to_string(),
            title,
            text,
            captured_at: Utc::now(),
        })
    }
}
