//! Artifact data model.
//! Mission: define explicit record types per artifact; these are the contract,
//! not the storage format (persisted as opaque JSON blobs by the RunStore).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single scraped page. Never addressable on its own — only a member of a ScrapeResult.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub url: String,
    pub title: String,
    pub text: String,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeMeta {
    pub input_url: String,
    pub domain: String,
    pub candidates_discovered: usize,
    pub candidates_survived_probe: usize,
    pub pages_scraped: usize,
    pub pages_after_dedupe: usize,
    pub duration_ms: u64,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub pages: Vec<Page>,
    pub meta: ScrapeMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidCitation {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvidenceValidation {
    pub valid: Vec<String>,
    pub invalid: Vec<InvalidCitation>,
    pub confidence_penalty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandAnalysis {
    pub brand_name: String,
    pub domain: String,
    pub tagline: String,
    pub category: String,
    pub value_propositions: Vec<String>,
    pub target_audience: String,
    pub positioning: String,
    pub key_features: Vec<String>,
    pub summary: String,
    pub evidence_refs: Vec<String>,
    pub reported_confidence: f64,
    #[serde(default)]
    pub evidence: EvidenceValidation,
}

impl BrandAnalysis {
    /// `surfaced = max(0, reported − penalty)`.
    pub fn surfaced_confidence(&self) -> f64 {
        (self.reported_confidence - self.evidence.confidence_penalty).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorCandidate {
    pub name: String,
    pub domain: String,
    pub confidence: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorAnalysis {
    #[serde(flatten)]
    pub base: BrandAnalysis,
    pub pricing_approach: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub differentiation: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CoverageLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordMap {
    pub brand_unique: Vec<String>,
    pub shared: Vec<String>,
    pub white_space: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapEntry {
    pub area: String,
    pub brand_coverage: CoverageLevel,
    pub competitor_coverage: CoverageLevel,
    pub opportunity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insights {
    pub strengths: Vec<String>,
    pub opportunities: Vec<String>,
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kernel {
    pub keyword_map: KeywordMap,
    pub gap_map: Vec<GapEntry>,
    pub insights: Insights,
    pub recommendations: Vec<String>,
}

/// Deterministic presentation projection of a BrandAnalysis, returned by BrandSummary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandCard {
    pub title: String,
    pub tagline: String,
    pub domain: String,
    pub category: String,
    pub confidence: f64,
    pub value_propositions: Vec<String>,
    pub key_features: Vec<String>,
    pub positioning: String,
    pub summary: String,
}

impl BrandCard {
    pub fn project(brand: &BrandAnalysis) -> Self {
        Self {
            title: brand.brand_name.clone(),
            tagline: brand.tagline.clone(),
            domain: brand.domain.clone(),
            category: brand.category.clone(),
            confidence: brand.surfaced_confidence(),
            value_propositions: brand.value_propositions.clone(),
            key_features: brand.key_features.clone(),
            positioning: brand.positioning.clone(),
            summary: brand.summary.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Active,
    Archived,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: RunStatus,
    pub metadata: serde_json::Value,
    pub brand: Option<BrandAnalysis>,
    pub competitors_ten: Option<Vec<CompetitorCandidate>>,
    pub competitors_analyzed: Option<Vec<CompetitorAnalysis>>,
    pub kernel: Option<Kernel>,
}
