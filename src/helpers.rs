//! Pure utility functions shared across the pipeline.
//! Mission: hashing, domain extraction, retry/backoff, and similarity scoring.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Hash a canonicalized URL into the key used by the two-tier cache and run store.
pub fn hash_url(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Canonicalize a brand URL: only `http`/`https`, fragment stripped.
///
/// Idempotent: `canonicalize(canonicalize(u)) == canonicalize(u)`.
pub fn canonicalize_url(input: &str) -> Result<String, CanonicalizeError> {
    let parsed = Url::parse(input).map_err(|_| CanonicalizeError::Malformed)?;
    match parsed.scheme() {
        "http" | "https" => {}
        _ => return Err(CanonicalizeError::UnsupportedScheme),
    }
    let mut out = parsed.clone();
    out.set_fragment(None);
    Ok(out.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalizeError {
    Malformed,
    UnsupportedScheme,
}

/// Extract the registrable host from a URL, with a leading `www.` stripped.
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Jaccard similarity over whitespace-split token sets.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() && tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Greedy near-duplicate collapse: keep the first page; drop any later page whose
/// Jaccard similarity to an already-kept page exceeds `threshold`.
pub fn dedupe_by_jaccard<T>(items: Vec<T>, threshold: f64, text_of: impl Fn(&T) -> &str) -> Vec<T> {
    let mut kept: Vec<T> = Vec::new();
    for item in items {
        let is_dup = kept
            .iter()
            .any(|k| jaccard_similarity(text_of(&item), text_of(k)) > threshold);
        if !is_dup {
            kept.push(item);
        }
    }
    kept
}

/// Exponential backoff schedule: base 2s, doubling, capped at `max_attempts`.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    base * 2u32.pow(attempt.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_strips_fragment() {
        let canon = canonicalize_url("https://Example.com/path#section").unwrap();
        assert_eq!(canon, "https://example.com/path");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let once = canonicalize_url("https://example.com/a?b=1").unwrap();
        let twice = canonicalize_url(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn canonicalize_rejects_non_http_schemes() {
        assert_eq!(
            canonicalize_url("ftp://example.com"),
            Err(CanonicalizeError::UnsupportedScheme)
        );
        assert_eq!(
            canonicalize_url("file:///etc/passwd"),
            Err(CanonicalizeError::UnsupportedScheme)
        );
        assert_eq!(canonicalize_url("not-a-url"), Err(CanonicalizeError::Malformed));
    }

    #[test]
    fn domain_extraction_strips_www() {
        assert_eq!(
            extract_domain("https://www.allbirds.com/shoes").as_deref(),
            Some("allbirds.com")
        );
        assert_eq!(
            extract_domain("https://allbirds.com").as_deref(),
            Some("allbirds.com")
        );
    }

    #[test]
    fn jaccard_identical_text_is_one() {
        assert_eq!(jaccard_similarity("the quick fox", "the quick fox"), 1.0);
    }

    #[test]
    fn jaccard_disjoint_text_is_zero() {
        assert_eq!(jaccard_similarity("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn dedupe_drops_near_duplicates() {
        let pages = vec![
            "the quick brown fox jumps".to_string(),
            "the quick brown fox leaps".to_string(), // near-dup of first
            "completely unrelated content here".to_string(),
        ];
        let kept = dedupe_by_jaccard(pages, 0.8, |s: &String| s.as_str());
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn backoff_doubles() {
        let base = Duration::from_secs(2);
        assert_eq!(backoff_delay(1, base), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, base), Duration::from_secs(4));
    }
}
