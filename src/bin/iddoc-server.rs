//! HTTP server binary for iddoc-extract.
//!
//! A thin shim over the library crate: maps CLI flags to `ExtractionConfig`,
//! builds the provider and pdfium binding once, and serves the router.

use anyhow::{Context, Result};
use clap::Parser;
use iddoc_extract::{
    create_router, resolve_provider, AppState, DocumentParser, ExtractionConfig, LlmVisionModel,
    PdfiumRasterizer,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ENDPOINTS:
  POST /api/parse-document   multipart/form-data, field "file" (image or .pdf)
  GET  /api/health           liveness probe

ENVIRONMENT:
  OPENAI_API_KEY             credential for the default provider (openai)
  ANTHROPIC_API_KEY, GEMINI_API_KEY, ...   other providers (with --provider)
  RUST_LOG                   log filter, overrides --verbose
  A .env file in the working directory is loaded at start-up.

PDFIUM:
  On first run the pdfium library is downloaded into the user cache dir
  (~/.cache/iddoc-extract/pdfium-7690/ on Linux).
  To use an existing copy: PDFIUM_LIB_PATH=/path/to/libpdfium iddoc-server
"#;

/// Serve identity-document extraction over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "iddoc-server",
    version,
    about = "Extract structured fields from identity documents with Vision LLMs",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "IDDOC_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "IDDOC_PORT", default_value_t = 8000)]
    port: u16,

    /// LLM model ID (default: gpt-4o-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "IDDOC_TEMPERATURE", default_value_t = 0.05)]
    temperature: f32,

    /// Maximum output tokens per model call.
    #[arg(long, env = "IDDOC_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries after a failed model call.
    #[arg(long, env = "IDDOC_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-call model timeout in seconds (no timeout when unset).
    #[arg(long, env = "IDDOC_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// PDF render zoom factor.
    #[arg(long, env = "IDDOC_RENDER_SCALE", default_value_t = 2.0)]
    render_scale: f32,

    /// Model calls in flight per PDF.
    #[arg(long, env = "IDDOC_PAGE_CONCURRENCY", default_value_t = 1)]
    page_concurrency: usize,

    /// Parent directory for per-request scratch dirs (default: OS temp dir).
    #[arg(long, env = "IDDOC_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Largest accepted request body, in MiB.
    #[arg(long, env = "IDDOC_MAX_UPLOAD_MB", default_value_t = 100)]
    max_upload_mb: usize,

    /// Debug-level logging.
    #[arg(short, long, env = "IDDOC_VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn to_config(&self) -> Result<ExtractionConfig> {
        let mut builder = ExtractionConfig::builder()
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .max_retries(self.max_retries)
            .render_scale(self.render_scale)
            .page_concurrency(self.page_concurrency)
            .max_upload_bytes(self.max_upload_mb.saturating_mul(1024 * 1024));
        if let Some(ref model) = self.model {
            builder = builder.model(model);
        }
        if let Some(ref provider) = self.provider {
            builder = builder.provider_name(provider);
        }
        if let Some(secs) = self.api_timeout {
            builder = builder.api_timeout_secs(secs);
        }
        if let Some(ref dir) = self.scratch_dir {
            builder = builder.scratch_dir(dir);
        }
        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; the environment may already be set.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.to_config()?;

    // ── Ensure PDFium engine is available ────────────────────────────────
    // First run downloads ~30 MB; later starts only check the cache.
    let pdfium_path = tokio::task::block_in_place(pdfium_auto::ensure_pdfium_library)
        .context("Failed to locate or download PDFium engine")?;

    // ── Model provider ───────────────────────────────────────────────────
    let provider = resolve_provider(&config)?;
    info!(
        "Vision model: {} (provider {})",
        config.model_or_default(),
        config.provider_name.as_deref().unwrap_or("auto")
    );

    let model = Arc::new(LlmVisionModel::new(provider, &config));
    let rasterizer = Arc::new(PdfiumRasterizer::new(pdfium_path, config.render_scale));
    let app = create_router(AppState::new(DocumentParser::new(
        config, model, rasterizer,
    )));

    let listener = tokio::net::TcpListener::bind((cli.host.as_str(), cli.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", cli.host, cli.port))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
