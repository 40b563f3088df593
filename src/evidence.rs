//! Evidence validator.
//! Mission: check every URL an analysis cites against the domain it claims to be
//! about, and turn violations into a confidence penalty rather than a hard failure.

use crate::helpers::extract_domain;
use crate::models::{EvidenceValidation, InvalidCitation};
use futures_util::future::join_all;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_PENALTY: f64 = 0.3;
const PENALTY_PER_INVALID: f64 = 0.3;

pub struct EvidenceValidator {
    client: Client,
}

impl EvidenceValidator {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }

    /// Validate every citation in `refs` against `expected_domain`. Citations whose
    /// host doesn't match, whose final (post-redirect) host doesn't match, or whose
    /// HEAD probe fails or returns a non-2xx status are rejected.
    pub async fn validate(&self, refs: &[String], expected_domain: &str) -> EvidenceValidation {
        if refs.is_empty() {
            return EvidenceValidation::default();
        }

        let checks = refs.iter().map(|url| self.check_one(url, expected_domain));
        let results = join_all(checks).await;

        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for (url, outcome) in refs.iter().zip(results) {
            match outcome {
                Ok(()) => valid.push(url.clone()),
                Err(reason) => {
                    debug!(url = %url, reason = %reason, "citation rejected");
                    invalid.push(InvalidCitation {
                        url: url.clone(),
                        reason,
                    });
                }
            }
        }

        let penalty = if refs.is_empty() {
            0.0
        } else {
            (invalid.len() as f64 / refs.len() as f64 * PENALTY_PER_INVALID).min(MAX_PENALTY)
        };

        EvidenceValidation {
            valid,
            invalid,
            confidence_penalty: penalty,
        }
    }

    async fn check_one(&self, url: &str, expected_domain: &str) -> Result<(), String> {
        let host = extract_domain(url).ok_or_else(|| "malformed url".to_string())?;
        if host != expected_domain {
            return Err(format!("host '{host}' does not match expected domain '{expected_domain}'"));
        }

        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| format!("probe failed: {e}"))?;

        let final_host = extract_domain(response.url().as_str())
            .ok_or_else(|| "redirected to malformed url".to_string())?;
        if final_host != expected_domain {
            return Err(format!(
                "redirected to '{final_host}', leaving expected domain '{expected_domain}'"
            ));
        }

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_refs_yield_zero_penalty() {
        let validator = EvidenceValidator::new().unwrap();
        let result = validator.validate(&[], "example.com").await;
        assert_eq!(result.confidence_penalty, 0.0);
        assert!(result.valid.is_empty());
        assert!(result.invalid.is_empty());
    }

    #[tokio::test]
    async fn mismatched_host_is_rejected_without_network() {
        let validator = EvidenceValidator::new().unwrap();
        let refs = vec!["https://totally-different.example/page".to_string()];
        let result = validator.validate(&refs, "allbirds.com").await;
        assert_eq!(result.invalid.len(), 1);
        assert_eq!(result.valid.len(), 0);
        assert!(result.confidence_penalty > 0.0);
    }

    #[test]
    fn penalty_formula_caps_at_point_three() {
        let refs = 10;
        let invalid = 10;
        let penalty = (invalid as f64 / refs as f64 * PENALTY_PER_INVALID).min(MAX_PENALTY);
        assert_eq!(penalty, 0.3);
    }
}
