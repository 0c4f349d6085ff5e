//! Request-level orchestration: one upload in, one aggregate result out.
//!
//! [`DocumentParser`] owns the injected collaborators and runs the pipeline
//! for a single upload. It holds no per-request state, so one instance is
//! shared by every request through `Arc`.

use crate::aggregate::aggregate;
use crate::config::{ExtractionConfig, DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::error::ParseError;
use crate::output::{AggregateResult, PageResult};
use crate::pipeline::encode::encode_file;
use crate::pipeline::intake::{DocumentKind, ScratchSpace, Upload};
use crate::pipeline::llm::{extract_page, VisionModel};
use crate::pipeline::render::{rasterize_pdf, PageRasterizer};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runs the extraction pipeline for uploaded documents.
pub struct DocumentParser {
    config: ExtractionConfig,
    model: Arc<dyn VisionModel>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl DocumentParser {
    pub fn new(
        config: ExtractionConfig,
        model: Arc<dyn VisionModel>,
        rasterizer: Arc<dyn PageRasterizer>,
    ) -> Self {
        Self {
            config,
            model,
            rasterizer,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract structured data from one uploaded document.
    ///
    /// The scratch directory lives exactly as long as this future; it is
    /// removed whether the call returns `Ok`, returns `Err`, or is dropped.
    ///
    /// # Errors
    /// * [`ParseError::Rasterization`]: the PDF is unreadable or empty
    /// * [`ParseError::ModelCall`]: the model could not be reached
    /// * [`ParseError::Scratch`]: scratch storage failed
    ///
    /// A model reply that is not valid JSON is *not* an error.
    pub async fn parse(&self, upload: Upload) -> Result<AggregateResult, ParseError> {
        let start = Instant::now();
        let kind = upload.kind();
        info!(
            "Received '{}' ({} bytes, {:?})",
            upload.filename,
            upload.bytes.len(),
            kind
        );

        let scratch = ScratchSpace::create(self.config.scratch_dir.as_deref())?;
        let saved = scratch.save_upload(&upload).await?;
        // The bytes are on disk now; release the in-memory copy early.
        drop(upload);

        let result = match kind {
            DocumentKind::Pdf => self.parse_pdf(&saved, scratch.path()).await?,
            DocumentKind::Image => {
                let page = self.extract(&saved, None).await?;
                AggregateResult::single(page.result)
            }
        };

        info!(
            "Extraction complete: {} page(s), type {:?}, confidence {:?} in {:?}",
            result.total_pages,
            result.result.document_type,
            result.result.confidence_indication,
            start.elapsed()
        );
        Ok(result)
    }

    async fn parse_pdf(
        &self,
        pdf_path: &Path,
        out_dir: &Path,
    ) -> Result<AggregateResult, ParseError> {
        let pages = rasterize_pdf(&self.rasterizer, pdf_path, out_dir).await?;
        info!("Rendered {} page(s)", pages.len());

        // `buffered` (not `buffer_unordered`) keeps results in page order.
        let results: Vec<PageResult> = stream::iter(
            pages
                .into_iter()
                .enumerate()
                .map(|(idx, path)| async move { self.extract(&path, Some(idx)).await }),
        )
        .buffered(self.config.page_concurrency.max(1))
        .try_collect()
        .await?;

        aggregate(results)
            .ok_or_else(|| ParseError::Internal("No page results to aggregate".to_string()))
    }

    /// Encode one image and run it through the model.
    async fn extract(
        &self,
        image_path: &Path,
        page_index: Option<usize>,
    ) -> Result<PageResult, ParseError> {
        let page_number = page_index.map(|i| i + 1).unwrap_or(1);
        let image = encode_file(image_path)
            .await
            .map_err(|e| ParseError::Scratch {
                path: image_path.to_path_buf(),
                source: e,
            })?;

        let today = chrono::Local::now().date_naive();
        let outcome = extract_page(self.model.as_ref(), image, page_index, today)
            .await
            .map_err(|source| ParseError::ModelCall {
                page: page_number,
                source,
            })?;

        debug!(
            "Page {} extracted (fallback: {})",
            page_number,
            outcome.is_fallback()
        );
        Ok(PageResult {
            page_number,
            result: outcome.into_result(),
        })
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ParseError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ParseError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Named provider** (`config.provider_name`) with `config.model` or
///    [`DEFAULT_MODEL`]. The factory reads the matching API key from the
///    environment.
/// 2. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured only when both are set.
/// 3. **OpenAI key present** → [`DEFAULT_PROVIDER`] with the configured or
///    default model.
/// 4. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Called once at start-up; credentials are never re-read per request.
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, ParseError> {
    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider(DEFAULT_PROVIDER, config.model_or_default());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ParseError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY (default model {DEFAULT_MODEL}) or pass --provider.\n\
                Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}
