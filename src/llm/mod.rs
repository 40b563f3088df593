//! LLM gateway.
//! Mission: one retrying, metered entry point for every JSON-mode completion call.

use crate::errors::PipelineError;
use crate::helpers::backoff_delay;
use crate::observability;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonObject,
};
use async_openai::Client;
use std::time::Duration;
use tracing::{error, warn};

const MODEL: &str = "gpt-4o-mini";
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(2);
const SYSTEM_PROMPT: &str =
    "You are a market research analyst. Respond with a single JSON object and nothing else.";

pub struct LlmGateway {
    client: Client<OpenAIConfig>,
    timeout: Duration,
}

impl LlmGateway {
    pub fn new(api_key: &str, timeout: Duration) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            timeout,
        }
    }

    /// Issue a JSON-mode completion for `prompt`, tagged with `endpoint` for metrics.
    /// Retries up to three attempts on timeout or 5xx/429; any other 4xx fails fast.
    pub async fn call(&self, endpoint: &'static str, prompt: &str) -> Result<String, PipelineError> {
        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(endpoint, prompt).await {
                Ok(text) => {
                    observability::openai_api_call(MODEL.to_string(), endpoint.to_string(), "success");
                    return Ok(text);
                }
                Err(AttemptError::Retryable(err)) => {
                    warn!(endpoint, attempt, error = %err, "retryable LLM failure");
                    last_err = Some(err);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff_delay(attempt, BACKOFF_BASE)).await;
                    }
                }
                Err(AttemptError::Fatal(err)) => {
                    observability::openai_api_call(MODEL.to_string(), endpoint.to_string(), "error");
                    error!(endpoint, error = %err, "fatal LLM failure");
                    return Err(err);
                }
            }
        }

        observability::openai_api_call(MODEL.to_string(), endpoint.to_string(), "exhausted");
        Err(last_err.unwrap_or(PipelineError::OpenAiError("exhausted retries".to_string())))
    }

    async fn attempt(&self, endpoint: &'static str, prompt: &str) -> Result<String, AttemptError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(MODEL)
            .temperature(0.7)
            .response_format(ResponseFormat::JsonObject(ResponseFormatJsonObject::default()))
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| AttemptError::Fatal(PipelineError::OpenAiError(e.to_string())))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| AttemptError::Fatal(PipelineError::OpenAiError(e.to_string())))?
                    .into(),
            ])
            .build()
            .map_err(|e| AttemptError::Fatal(PipelineError::OpenAiError(e.to_string())))?;

        let response = match tokio::time::timeout(self.timeout, self.client.chat().create(request)).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Err(classify(e)),
            Err(_) => return Err(AttemptError::Retryable(PipelineError::OpenAiTimeout)),
        };

        if let Some(usage) = &response.usage {
            observability::openai_tokens_used(
                MODEL.to_string(),
                endpoint.to_string(),
                usage.total_tokens as u64,
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                AttemptError::Fatal(PipelineError::OpenAiError("empty completion".to_string()))
            })
    }
}

enum AttemptError {
    Retryable(PipelineError),
    Fatal(PipelineError),
}

/// 429 and 5xx are retryable; every other 4xx (bad request, auth, etc.) is fatal.
fn classify(err: async_openai::error::OpenAIError) -> AttemptError {
    use async_openai::error::OpenAIError;
    match &err {
        OpenAIError::ApiError(api_err) => {
            let retryable = api_err
                .code
                .as_deref()
                .map(|c| c == "429" || c.starts_with('5'))
                .unwrap_or(false);
            if retryable {
                AttemptError::Retryable(PipelineError::OpenAiError(err.to_string()))
            } else {
                AttemptError::Fatal(PipelineError::OpenAiError(err.to_string()))
            }
        }
        OpenAIError::Reqwest(_) => AttemptError::Retryable(PipelineError::OpenAiError(err.to_string())),
        _ => AttemptError::Fatal(PipelineError::OpenAiError(err.to_string())),
    }
}
