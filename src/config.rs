//! Runtime configuration.
//! Mission: load every tunable once at startup, with safe fallbacks.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub api_key: String,
    pub openai_api_key: String,
    pub openai_timeout: Duration,
    pub redis_url: String,
    pub sqlite_path: String,
    pub scrape_concurrency: usize,
    pub browser_pool_size: usize,
    pub cache_ttl_scraping: Duration,
    pub rate_limit_max: u32,
    pub request_timeout: Duration,
    pub run_expiration_days: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let api_key = env::var("API_KEY")
            .map_err(|_| anyhow::anyhow!("API_KEY is required"))?;
        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY is required"))?;
        let sqlite_path = env::var("DATABASE_DSN")
            .map_err(|_| anyhow::anyhow!("DATABASE_DSN is required"))?;
        let redis_url = env::var("CACHE_DSN")
            .map_err(|_| anyhow::anyhow!("CACHE_DSN is required"))?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let openai_timeout_ms: u64 = env::var("OPENAI_TIMEOUT")
            .unwrap_or_else(|_| "60000".to_string())
            .parse()
            .unwrap_or(60_000);

        let scrape_concurrency = env::var("SCRAPE_CONCURRENCY")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        let browser_pool_size = env::var("BROWSER_POOL_SIZE")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .unwrap_or(3);

        let cache_ttl_scraping: u64 = env::var("CACHE_TTL_SCRAPING")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .unwrap_or(86_400);

        let rate_limit_max = env::var("RATE_LIMIT_MAX")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .unwrap_or(20);

        let request_timeout_ms: u64 = env::var("REQUEST_TIMEOUT")
            .unwrap_or_else(|_| "120000".to_string())
            .parse()
            .unwrap_or(120_000);

        let run_expiration_days = env::var("RUN_EXPIRATION_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .unwrap_or(7);

        Ok(Self {
            port,
            api_key,
            openai_api_key,
            openai_timeout: Duration::from_millis(openai_timeout_ms),
            redis_url,
            sqlite_path,
            scrape_concurrency,
            browser_pool_size,
            cache_ttl_scraping: Duration::from_secs(cache_ttl_scraping),
            rate_limit_max,
            request_timeout: Duration::from_millis(request_timeout_ms),
            run_expiration_days,
        })
    }
}
