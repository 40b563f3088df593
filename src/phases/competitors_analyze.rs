use crate::errors::PipelineError;
use crate::evidence::EvidenceValidator;
use crate::llm::LlmGateway;
use crate::models::{CompetitorAnalysis, CompetitorCandidate};
use crate::run_store::RunStore;
use crate::scraper::Scraper;
use futures_util::future::join_all;
use std::sync::Arc;

const ENDPOINT: &str = "competitors-analyze";

pub struct CompetitorsAnalyzePhase {
    scraper: Arc<Scraper>,
    llm: Arc<LlmGateway>,
    evidence: Arc<EvidenceValidator>,
    store: Arc<RunStore>,
}

impl CompetitorsAnalyzePhase {
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

    /// Requires `competitorsTen`. Unlike the scraper's own probe/fetch stages,
    /// a single competitor failing its scrape or analysis fails the whole call:
    /// a partial competitor set would silently understate the landscape.
    pub async fn run(&self, run_id: &str) -> Result<Vec<CompetitorAnalysis>, PipelineError> {
        let run = self
            .store
            .get(run_id)
            .map_err(|e| PipelineError::Internal(e.to_string()))?
            .ok_or(PipelineError::PrereqMissing { missing_slot: "run" })?;

        let candidates = run
            .competitors_ten
            .as_ref()
            .ok_or(PipelineError::PrereqMissing {
                missing_slot: "competitorsTen",
            })?;

        let analyses = join_all(candidates.iter().map(|c| self.analyze_one(c))).await;
        let mut results = Vec::with_capacity(analyses.len());
        for analysis in analyses {
            results.push(analysis?);
        }

        self.store.save_analyzed(run_id, &results)?;
        Ok(results)
    }

    async fn analyze_one(&self, candidate: &CompetitorCandidate) -> Result<CompetitorAnalysis, PipelineError> {
        let scraped = self.scraper.scrape(&format!("https://{}", candidate.domain)).await?;

        let corpus: String = scraped
            .pages
            .iter()
            .map(|p| format!("## {}\n{}\n", p.title, p.text))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Analyze this competitor ({}) against the candidate rationale \"{}\". Return a JSON object \
with keys: brand_name, domain, tagline, category, value_propositions (array), target_audience, \
positioning, key_features (array), summary, evidence_refs (array of URLs from the pages below), \
reported_confidence (0 to 1), pricing_approach, strengths (array), weaknesses (array), differentiation.\n\n\
Pages:\n{corpus}",
            candidate.name, candidate.rationale
        );

        let raw = self.llm.call(ENDPOINT, &prompt).await?;
        let mut analysis: CompetitorAnalysis = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::OpenAiError(format!("malformed competitor analysis json: {e}")))?;

        analysis.base.domain = scraped.meta.domain.clone();
        analysis.base.evidence = self
            .evidence
            .validate(&analysis.base.evidence_refs, &analysis.base.domain)
            .await;

        // Evidence validation already folded invalid citations into a confidence
        // penalty; a single competitor landing below threshold adjusts its own
        // confidence but never fails the batch.
        Ok(analysis)
    }
}
