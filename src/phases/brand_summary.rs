use super::LOW_CONFIDENCE_THRESHOLD;
use crate::errors::PipelineError;
use crate::evidence::EvidenceValidator;
use crate::llm::LlmGateway;
use crate::models::{BrandAnalysis, BrandCard, Run};
use crate::run_store::RunStore;
use crate::scraper::Scraper;
use std::sync::Arc;

const ENDPOINT: &str = "brand-summary";
const MIN_PAGES: usize = 3;

pub struct BrandSummaryPhase {
    scraper: Arc<Scraper>,
    llm: Arc<LlmGateway>,
    evidence: Arc<EvidenceValidator>,
    store: Arc<RunStore>,
}

impl BrandSummaryPhase {
    pub fn new(
        scraper: Arc<Scraper>,
        llm: Arc<LlmGateway>,
        evidence: Arc<EvidenceValidator>,
        store: Arc<RunStore>,
    ) -> Self {
        Self {
            scraper,
            llm,
            evidence,
            store,
        }
    }

    /// No prerequisite: this is the entry point of every pipeline run.
    pub async fn run(&self, brand_url: &str) -> Result<(Run, BrandCard), PipelineError> {
        let scraped = self.scraper.scrape(brand_url).await?;
        if scraped.pages.len() < MIN_PAGES {
            return Err(PipelineError::InsufficientData);
        }

        let prompt = build_prompt(&scraped);
        let raw = self.llm.call(ENDPOINT, &prompt).await?;
        let mut brand: BrandAnalysis = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::OpenAiError(format!("malformed analysis json: {e}")))?;

        brand.domain = scraped.meta.domain.clone();
        brand.evidence = self.evidence.validate(&brand.evidence_refs, &brand.domain).await;

        let surfaced = brand.surfaced_confidence();
        if surfaced < LOW_CONFIDENCE_THRESHOLD {
            return Err(PipelineError::LowConfidence {
                confidence: surfaced,
                invalid_citations: serde_json::to_value(&brand.evidence.invalid).unwrap_or_default(),
            });
        }

        let mut run = self
            .store
            .create(serde_json::json!({ "brandUrl": brand_url }))
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        self.store.save_brand(&run.run_id, &brand)?;

        let card = BrandCard::project(&brand);
        run.brand = Some(brand);
        Ok((run, card))
    }
}

fn build_prompt(scraped: &crate::models::ScrapeResult) -> String {
    let corpus: String = scraped
        .pages
        .iter()
        .map(|p| format!("## {}\n{}\n", p.title, truncate(&p.text, 4000)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze the following scraped brand website content and return a JSON object with keys: \
brand_name, domain, tagline, category, value_propositions (array), target_audience, positioning, \
key_features (array), summary, evidence_refs (array of URLs drawn only from the pages below), \
reported_confidence (0 to 1).\n\nDomain: {}\n\nPages:\n{}",
        scraped.meta.domain, corpus
    )
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
