//! Pipeline stages for identity-document extraction.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the two external collaborators (pdfium and the hosted model) sit
//! behind traits that tests replace.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ render ──▶ encode ──▶ llm
//! (scratch)  (pdfium)   (base64)   (VLM + JSON decode)
//! ```
//!
//! 1. [`intake`]: classify the upload (PDF or image) and save it into a
//!    per-request scratch directory
//! 2. [`render`]: rasterise every PDF page to PNG; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`encode`]: base64-wrap each image with its detected MIME type
//! 4. [`llm`]: the only stage with network I/O; turns the model reply
//!    into a parsed result or a degraded fallback

pub mod encode;
pub mod intake;
pub mod llm;
pub mod render;
