//! Error types for the iddoc-extract library.
//!
//! Three error types map onto three collaborators:
//!
//! * [`ParseError`]: **request-fatal**: the upload cannot be turned into a
//!   result at all (no file, empty filename, unreadable PDF, model
//!   unreachable). Returned as `Err(ParseError)` from
//!   [`crate::parse::DocumentParser::parse`] and rendered as an HTTP error
//!   by [`crate::server`].
//!
//! * [`RasterizeError`]: raised by a [`crate::pipeline::render::PageRasterizer`].
//!   Document failures surface to clients as the same 400 message; a
//!   pdfium library that cannot be bound is a 500.
//!
//! * [`ModelError`]: transport or API failure of the vision model call.
//!
//! Malformed model *output* is not an error anywhere in this crate: it is
//! recovered into a degraded [`crate::output::ExtractionResult`] by
//! [`crate::pipeline::llm`].

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors for a single parse request.
#[derive(Debug, Error)]
pub enum ParseError {
    // ── Request-shape errors ──────────────────────────────────────────────
    /// The multipart body carries no `file` upload.
    #[error("No file uploaded")]
    NoFileUploaded,

    /// The `file` part was sent with an empty filename.
    #[error("Empty filename")]
    EmptyFilename,

    /// The multipart stream broke off or exceeded the body limit.
    #[error("Failed to read upload: {detail}")]
    InvalidUpload { detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF could not be opened, rendered, or has no pages.
    #[error("Failed to extract pages from PDF")]
    Rasterization(#[source] RasterizeError),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider could not be constructed (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The vision model call failed for one page.
    #[error("Vision model call failed on page {page}: {source}")]
    ModelCall {
        page: usize,
        #[source]
        source: ModelError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Scratch storage could not be created or written.
    #[error("Scratch storage error at '{path}': {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParseError {
    /// Whether the failure was caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ParseError::NoFileUploaded
                | ParseError::EmptyFilename
                | ParseError::InvalidUpload { .. }
                | ParseError::Rasterization(_)
        )
    }
}

/// Failures of the page renderer.
#[derive(Debug, Error)]
pub enum RasterizeError {
    /// pdfium refused the document (corrupt, encrypted, not a PDF).
    #[error("PDF '{path}' could not be opened: {detail}")]
    Open { path: PathBuf, detail: String },

    /// The document opened but contains no pages.
    #[error("PDF '{path}' has no pages")]
    NoPages { path: PathBuf },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    Render { page: usize, detail: String },

    /// A rendered page could not be written to scratch storage.
    #[error("Failed to write page {page} image: {detail}")]
    WriteImage { page: usize, detail: String },

    /// Could not bind to a pdfium library. Not the client's fault.
    #[error("Failed to bind to pdfium library: {0}")]
    Binding(String),
}

/// Transport-level failure of a vision model call.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The provider returned an error on every attempt.
    #[error("provider error after {attempts} attempt(s): {message}")]
    Provider { attempts: u32, message: String },

    /// The call did not complete within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape_messages_are_exact() {
        assert_eq!(ParseError::NoFileUploaded.to_string(), "No file uploaded");
        assert_eq!(ParseError::EmptyFilename.to_string(), "Empty filename");
    }

    #[test]
    fn every_rasterization_failure_has_one_message() {
        let errors = [
            RasterizeError::NoPages {
                path: PathBuf::from("a.pdf"),
            },
            RasterizeError::Open {
                path: PathBuf::from("a.pdf"),
                detail: "FormatError".into(),
            },
            RasterizeError::Render {
                page: 2,
                detail: "oom".into(),
            },
        ];
        for e in errors {
            let e = ParseError::Rasterization(e);
            assert_eq!(e.to_string(), "Failed to extract pages from PDF");
            assert!(e.is_client_error());
        }
    }

    #[test]
    fn model_call_display_names_page() {
        let e = ParseError::ModelCall {
            page: 3,
            source: ModelError::Timeout { secs: 30 },
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"), "got: {msg}");
        assert!(msg.contains("30s"), "got: {msg}");
        assert!(!e.is_client_error());
    }

    #[test]
    fn provider_error_display() {
        let e = ModelError::Provider {
            attempts: 2,
            message: "invalid key".into(),
        };
        assert!(e.to_string().contains("2 attempt"));
        assert!(e.to_string().contains("invalid key"));
    }
}
