//! # iddoc-extract
//!
//! Extract structured data from identity documents (passports, national ID
//! cards, driving licences) with a Vision Language Model, served over HTTP.
//!
//! ## Why a vision model?
//!
//! Identity documents mix printed labels, handwriting-like fonts, holograms
//! and machine-readable zones in layouts that differ per issuing country.
//! Instead of per-country templates, each page is shown to a VLM as an image
//! and the model returns a fixed JSON shape: the document type, the visible
//! fields grouped by section, any inconsistencies it noticed, and a
//! confidence level.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (image or PDF)
//!  │
//!  ├─ 1. Intake     save into a per-request scratch dir
//!  ├─ 2. Render     PDF only: rasterise pages via pdfium (spawn_blocking)
//!  ├─ 3. Encode     image → base64 ImageData
//!  ├─ 4. VLM        one call per page; bad JSON becomes a fallback result
//!  └─ 5. Aggregate  merge pages into one response
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use iddoc_extract::{
//!     create_router, resolve_provider, AppState, DocumentParser, ExtractionConfig,
//!     LlmVisionModel, PdfiumRasterizer,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let provider = resolve_provider(&config)?;
//!     let model = Arc::new(LlmVisionModel::new(provider, &config));
//!     let rasterizer = Arc::new(PdfiumRasterizer::new(
//!         pdfium_auto::ensure_pdfium_library()?,
//!         config.render_scale,
//!     ));
//!     let app = create_router(AppState::new(DocumentParser::new(config, model, rasterizer)));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `iddoc-server` binary (clap + anyhow + dotenvy + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod aggregate;
pub mod config;
pub mod error;
pub mod output;
pub mod parse;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use aggregate::aggregate;
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ModelError, ParseError, RasterizeError};
pub use output::{AggregateResult, Confidence, DocumentType, ExtractionResult, PageResult};
pub use parse::{resolve_provider, DocumentParser};
pub use pipeline::intake::Upload;
pub use pipeline::llm::{ExtractionOutcome, LlmVisionModel, VisionModel};
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer};
pub use server::{create_router, AppError, AppState};
