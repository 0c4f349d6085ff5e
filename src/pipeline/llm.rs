//! VLM interaction: send one page image to the model and decode its JSON.
//!
//! Two concerns live here and nowhere else:
//!
//! * [`VisionModel`]: the seam to the hosted model. [`LlmVisionModel`]
//!   implements it over any `edgequake-llm` provider; tests substitute a
//!   scripted model.
//! * [`extract_page`]: prompt in, [`ExtractionOutcome`] out. A reply that is
//!   not valid JSON in the expected shape never fails the request; it becomes
//!   the [`ExtractionOutcome::Fallback`] variant carrying the raw text.

use crate::config::ExtractionConfig;
use crate::error::ModelError;
use crate::output::ExtractionResult;
use crate::prompts::extraction_prompt;
use async_trait::async_trait;
use chrono::NaiveDate;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// A vision-capable model that answers a text prompt about one image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Return the model's raw text reply.
    async fn complete(&self, prompt: &str, image: ImageData) -> Result<String, ModelError>;
}

/// What came back from the model for one page.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// The reply decoded as an extraction result.
    Parsed(ExtractionResult),
    /// The reply was not usable JSON; `raw_output` is kept for debugging.
    Fallback { raw_output: String, reason: String },
}

impl ExtractionOutcome {
    /// Decode a model reply.
    pub fn from_reply(reply: String) -> Self {
        match serde_json::from_str::<ExtractionResult>(&reply) {
            Ok(mut result) => {
                // Only the fallback may carry raw_output.
                result.raw_output = None;
                ExtractionOutcome::Parsed(result)
            }
            Err(e) => ExtractionOutcome::Fallback {
                raw_output: reply,
                reason: e.to_string(),
            },
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ExtractionOutcome::Fallback { .. })
    }

    /// Collapse into the result shape returned to clients.
    pub fn into_result(self) -> ExtractionResult {
        match self {
            ExtractionOutcome::Parsed(result) => result,
            ExtractionOutcome::Fallback { raw_output, .. } => {
                ExtractionResult::parse_failure(raw_output)
            }
        }
    }
}

/// Extract fields from one image.
///
/// `page_index` is 0-based and only set for PDF pages; it adds
/// "(Page N)" to the prompt. Errors are transport failures only.
pub async fn extract_page(
    model: &dyn VisionModel,
    image: ImageData,
    page_index: Option<usize>,
    today: NaiveDate,
) -> Result<ExtractionOutcome, ModelError> {
    let prompt = extraction_prompt(today, page_index);
    let reply = model.complete(&prompt, image).await?;
    let outcome = ExtractionOutcome::from_reply(reply);

    if let ExtractionOutcome::Fallback { reason, raw_output } = &outcome {
        warn!(
            "Page {}: model reply is not valid extraction JSON ({}); {} chars kept as raw_output",
            page_index.map(|i| i + 1).unwrap_or(1),
            reason,
            raw_output.len()
        );
    }
    Ok(outcome)
}

/// [`VisionModel`] over an `edgequake-llm` provider.
///
/// The provider is built once at start-up and shared by every request.
pub struct LlmVisionModel {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: Option<u64>,
}

impl LlmVisionModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    async fn call_once(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let call = self.provider.chat(messages, Some(&self.options));
        let response = match self.api_timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), call)
                .await
                .map_err(|_| ModelError::Timeout { secs })?,
            None => call.await,
        }
        .map_err(|e| ModelError::Provider {
            attempts: 1,
            message: e.to_string(),
        })?;

        debug!(
            "{} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

#[async_trait]
impl VisionModel for LlmVisionModel {
    async fn complete(&self, prompt: &str, image: ImageData) -> Result<String, ModelError> {
        let start = Instant::now();
        // The instructions and the image travel in one user turn.
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image])];

        let mut attempt = 0;
        loop {
            match self.call_once(&messages).await {
                Ok(content) => {
                    debug!("Model replied in {:?}", start.elapsed());
                    return Ok(content);
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = self
                        .retry_backoff_ms
                        .saturating_mul(1u64 << (attempt - 1).min(16));
                    warn!(
                        "Model call failed ({}); retry {}/{} in {}ms",
                        e, attempt, self.max_retries, backoff
                    );
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(ModelError::Provider { message, .. }) => {
                    return Err(ModelError::Provider {
                        attempts: attempt + 1,
                        message,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
