use crate::errors::PipelineError;
use crate::llm::LlmGateway;
use crate::models::CompetitorCandidate;
use crate::run_store::RunStore;
use std::sync::Arc;

const ENDPOINT: &str = "competitors";
const CANDIDATE_COUNT: usize = 10;
const MIN_CONFIDENCE: f64 = 0.6;

pub struct CompetitorsPhase {
    llm: Arc<LlmGateway>,
    store: Arc<RunStore>,
}

impl CompetitorsPhase {
    pub fn new(llm: Arc<LlmGateway>, store: Arc<RunStore>) -> Self {
        Self { llm, store }
    }

    /// Requires `brand`. `brand_domain` is accepted for API symmetry with the
    /// brand-summary request but is not used: the run's own brand analysis is
    /// already the authoritative source of the domain.
    pub async fn run(
        &self,
        run_id: &str,
        _brand_domain: Option<&str>,
    ) -> Result<Vec<CompetitorCandidate>, PipelineError> {
        let run = self
            .store
            .get(run_id)
            .map_err(|e| PipelineError::Internal(e.to_string()))?
            .ok_or(PipelineError::PrereqMissing { missing_slot: "run" })?;

        let brand = run
            .brand
            .as_ref()
            .ok_or(PipelineError::PrereqMissing { missing_slot: "brand" })?;

        let prompt = format!(
            "Given this brand analysis, identify exactly {CANDIDATE_COUNT} real direct competitors. \
Return a JSON object with a single key \"competitors\", an array of objects each with keys: \
name, domain, confidence (0 to 1), rationale.\n\nBrand: {}\nCategory: {}\nPositioning: {}\nSummary: {}",
            brand.brand_name, brand.category, brand.positioning, brand.summary
        );

        let raw = self.llm.call(ENDPOINT, &prompt).await?;

        #[derive(serde::Deserialize)]
        struct Wrapper {
            competitors: Vec<CompetitorCandidate>,
        }
        let wrapper: Wrapper = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::OpenAiError(format!("malformed competitors json: {e}")))?;

        let competitors: Vec<CompetitorCandidate> = wrapper
            .competitors
            .into_iter()
            .filter(|c| c.confidence >= MIN_CONFIDENCE)
            .collect();

        self.store.save_competitors(run_id, &competitors)?;
        Ok(competitors)
    }
}
