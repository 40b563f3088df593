use crate::errors::PipelineError;
use crate::llm::LlmGateway;
use crate::models::Kernel;
use crate::run_store::RunStore;
use std::sync::Arc;

const ENDPOINT: &str = "kernel";

pub struct KernelPhase {
    llm: Arc<LlmGateway>,
    store: Arc<RunStore>,
}

impl KernelPhase {
    pub fn new(llm: Arc<LlmGateway>, store: Arc<RunStore>) -> Self {
        Self { llm, store }
    }

    /// Requires both `brand` and `competitorsAnalyzed`.
    pub async fn run(&self, run_id: &str) -> Result<Kernel, PipelineError> {
        let run = self
            .store
            .get(run_id)
            .map_err(|e| PipelineError::Internal(e.to_string()))?
            .ok_or(PipelineError::PrereqMissing { missing_slot: "run" })?;

        let brand = run
            .brand
            .as_ref()
            .ok_or(PipelineError::PrereqMissing { missing_slot: "brand" })?;
        let competitors = run.competitors_analyzed.as_ref().ok_or(PipelineError::PrereqMissing {
            missing_slot: "competitorsAnalyzed",
        })?;

        let competitor_summaries: String = competitors
            .iter()
            .map(|c| {
                format!(
                    "- {} ({}): {} | strengths: {:?} | weaknesses: {:?}",
                    c.base.brand_name, c.base.domain, c.differentiation, c.strengths, c.weaknesses
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Synthesize a brand kernel from this brand analysis and its competitor analyses. Return a \
JSON object with keys: keyword_map (object with brand_unique, shared, white_space arrays), gap_map \
(array of objects with area, brand_coverage, competitor_coverage [low|medium|high], opportunity), \
insights (object with strengths, opportunities, risks arrays), recommendations (array).\n\n\
Brand: {} — {}\nValue propositions: {:?}\nKey features: {:?}\n\nCompetitors:\n{}",
            brand.brand_name, brand.summary, brand.value_propositions, brand.key_features, competitor_summaries
        );

        let raw = self.llm.call(ENDPOINT, &prompt).await?;
        let kernel: Kernel = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::OpenAiError(format!("malformed kernel json: {e}")))?;

        self.store.save_kernel(run_id, &kernel)?;
        Ok(kernel)
    }
}
