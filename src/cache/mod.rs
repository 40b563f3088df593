//! Two-tier scrape cache.
//! Mission: low-latency read in front of a durable store, keyed by the
//! canonical URL's hash. A write-through cache is an optimization: its
//! failures are logged, never propagated into the scrape pipeline.

use crate::helpers::hash_url;
use crate::models::ScrapeResult;
use crate::observability;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use redis::AsyncCommands;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub hash: String,
    pub url: String,
    pub body: ScrapeResult,
    pub scraped_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub page_count: usize,
    pub access_count: u64,
    pub last_accessed_at: DateTime<Utc>,
}

pub struct TwoTierCache {
    fast: Option<redis::aio::ConnectionManager>,
    durable: Arc<Mutex<Connection>>,
}

impl TwoTierCache {
    /// `durable` is the same connection the run store uses, in its own table
    /// namespace: one rusqlite file backs both, as it's the only process-local
    /// durable store this service has.
    ///
    /// Connects the fast tier opportunistically: its absence at startup is not
    /// an error (the invariant only requires the durable tier to survive restarts).
    pub async fn new(redis_url: &str, durable: Arc<Mutex<Connection>>) -> anyhow::Result<Self> {
        {
            let conn = durable.lock();
            conn.execute(
                "CREATE TABLE IF NOT EXISTS scraping_cache (
                    hash TEXT PRIMARY KEY,
                    url TEXT NOT NULL,
                    body TEXT NOT NULL,
                    scraped_at TEXT NOT NULL,
                    expires_at TEXT NOT NULL,
                    page_count INTEGER NOT NULL,
                    access_count INTEGER NOT NULL DEFAULT 0,
                    last_accessed_at TEXT NOT NULL
                )",
                [],
            )?;
        }

        let fast = match redis::Client::open(redis_url) {
            Ok(client) => match redis::aio::ConnectionManager::new(client).await {
                Ok(conn) => Some(conn),
                Err(e) => {
                    warn!(error = %e, "fast cache tier unreachable at startup, continuing without it");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "invalid fast cache tier DSN, continuing without it");
                None
            }
        };

        Ok(Self { fast, durable })
    }

    pub async fn get(&self, url: &str) -> Option<ScrapeResult> {
        let key = hash_url(url);

        if let Some(mut fast) = self.fast.clone() {
            match fast.get::<_, Option<String>>(&key).await {
                Ok(Some(json)) => {
                    observability::cache_hit("fast");
                    if let Ok(result) = serde_json::from_str(&json) {
                        return Some(result);
                    }
                }
                Ok(None) => observability::cache_miss("fast"),
                Err(e) => warn!(error = %e, "fast tier read failed"),
            }
        }

        let row = {
            let conn = self.durable.lock();
            conn.query_row(
                "SELECT body, expires_at FROM scraping_cache WHERE hash = ?1",
                params![key],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
            )
            .optional()
        };

        match row {
            Ok(Some((body, expires_at))) => {
                let expires_at: DateTime<Utc> = match expires_at.parse() {
                    Ok(t) => t,
                    Err(_) => return None,
                };
                if expires_at < Utc::now() {
                    observability::cache_miss("durable");
                    return None;
                }
                observability::cache_hit("durable");
                match serde_json::from_str::<ScrapeResult>(&body) {
                    Ok(result) => {
                        self.backfill_fast(&key, &body, expires_at).await;
                        Some(result)
                    }
                    Err(e) => {
                        warn!(error = %e, "durable tier body failed to deserialize");
                        None
                    }
                }
            }
            Ok(None) => {
                observability::cache_miss("durable");
                None
            }
            Err(e) => {
                warn!(error = %e, "durable tier read failed");
                None
            }
        }
    }

    async fn backfill_fast(&self, key: &str, body: &str, expires_at: DateTime<Utc>) {
        if let Some(mut fast) = self.fast.clone() {
            let ttl = (expires_at - Utc::now()).num_seconds().max(1) as u64;
            if let Err(e) = fast.set_ex::<_, _, ()>(key, body, ttl).await {
                warn!(error = %e, "fast tier backfill failed");
            }
        }
    }

    pub async fn put(&self, url: &str, body: &ScrapeResult, ttl: Duration) {
        let key = hash_url(url);
        let json = match serde_json::to_string(body) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize scrape result for caching");
                return;
            }
        };
        let now = Utc::now();
        let expires_at = now + chrono::Duration::seconds(ttl.as_secs() as i64);

        let fast_write = async {
            if let Some(mut fast) = self.fast.clone() {
                if let Err(e) = fast
                    .set_ex::<_, _, ()>(&key, &json, ttl.as_secs().max(1))
                    .await
                {
                    warn!(error = %e, "fast tier write failed");
                }
            }
        };

        let durable_write = async {
            let conn = self.durable.lock();
            let result = conn.execute(
                "INSERT INTO scraping_cache
                    (hash, url, body, scraped_at, expires_at, page_count, access_count, last_accessed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?4)
                 ON CONFLICT(hash) DO UPDATE SET
                    url = excluded.url,
                    body = excluded.body,
                    scraped_at = excluded.scraped_at,
                    expires_at = excluded.expires_at,
                    page_count = excluded.page_count,
                    access_count = access_count + 1,
                    last_accessed_at = excluded.last_accessed_at",
                params![
                    key,
                    url,
                    json,
                    now.to_rfc3339(),
                    expires_at.to_rfc3339(),
                    body.pages.len() as i64,
                ],
            );
            if let Err(e) = result {
                warn!(error = %e, "durable tier write failed");
            }
        };

        tokio::join!(fast_write, durable_write);
    }

    pub async fn invalidate(&self, url: &str) {
        let key = hash_url(url);
        if let Some(mut fast) = self.fast.clone() {
            if let Err(e) = fast.del::<_, ()>(&key).await {
                warn!(error = %e, "fast tier invalidate failed");
            }
        }
        let conn = self.durable.lock();
        if let Err(e) = conn.execute("DELETE FROM scraping_cache WHERE hash = ?1", params![key]) {
            warn!(error = %e, "durable tier invalidate failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScrapeMeta;

    fn sample_result(url: &str) -> ScrapeResult {
        ScrapeResult {
            pages: vec![],
            meta: ScrapeMeta {
                input_url: url.to_string(),
                domain: "example.com".to_string(),
                candidates_discovered: 1,
                candidates_survived_probe: 1,
                pages_scraped: 0,
                pages_after_dedupe: 0,
                duration_ms: 0,
                captured_at: Utc::now(),
            },
        }
    }

    async fn durable_only_cache() -> TwoTierCache {
        let conn = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
        // An unreachable fast-tier DSN: the cache must still function on the
        // durable tier alone, matching "absence at startup is not an error".
        TwoTierCache::new("redis://127.0.0.1:1/", conn).await.unwrap()
    }

    #[tokio::test]
    async fn put_then_get_round_trips_through_durable_tier() {
        let cache = durable_only_cache().await;
        let url = "https://example.com/";
        let result = sample_result(url);

        cache.put(url, &result, Duration::from_secs(86_400)).await;
        let fetched = cache.get(url).await.expect("should hit durable tier");
        assert_eq!(fetched.meta.input_url, url);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = durable_only_cache().await;
        let url = "https://example.com/";
        cache
            .put(url, &sample_result(url), Duration::from_secs(86_400))
            .await;
        cache.invalidate(url).await;
        assert!(cache.get(url).await.is_none());
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = durable_only_cache().await;
        let url = "https://example.com/";
        cache.put(url, &sample_result(url), Duration::from_secs(0)).await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(cache.get(url).await.is_none());
    }
}
