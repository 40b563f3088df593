//! Cross-cutting metrics.
//! Mission: name and centralize every gauge/counter/histogram the core publishes.

use metrics::{counter, gauge, histogram};

pub fn pool_stats(total: usize, in_use: usize, available: usize) {
    gauge!("browser_pool_total").set(total as f64);
    gauge!("browser_pool_in_use").set(in_use as f64);
    gauge!("browser_pool_available").set(available as f64);
}

pub fn cache_hit(tier: &'static str) {
    counter!("cache_hits_total", "tier" => tier).increment(1);
}

pub fn cache_miss(tier: &'static str) {
    counter!("cache_misses_total", "tier" => tier).increment(1);
}

pub fn scraping_duration(domain: String, millis: u64) {
    histogram!("scraping_duration_ms", "domain" => domain).record(millis as f64);
}

pub fn openai_tokens_used(model: String, endpoint: String, tokens: u64) {
    counter!("openai_tokens_used_total", "model" => model, "endpoint" => endpoint)
        .increment(tokens);
}

pub fn openai_api_call(model: String, endpoint: String, status: &'static str) {
    counter!(
        "openai_api_calls_total",
        "model" => model,
        "endpoint" => endpoint,
        "status" => status
    )
    .increment(1);
}

pub fn active_runs(count: u64) {
    gauge!("active_runs").set(count as f64);
}
