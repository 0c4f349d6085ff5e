//! Upload intake: classify the uploaded file and give it a scratch home.
//!
//! pdfium needs a file-system path, and page images have to live somewhere
//! between rendering and encoding. Each request gets one private [`TempDir`];
//! the upload and every derived page image are written inside it, and
//! dropping the [`ScratchSpace`] removes the lot, including when the request
//! fails or its future is dropped.

use crate::error::ParseError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// How an upload will be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Rasterise every page, extract per page, then merge.
    Pdf,
    /// Send the file to the model as-is.
    Image,
}

impl DocumentKind {
    /// Classify by filename suffix; `.pdf` in any case is a PDF.
    pub fn from_filename(filename: &str) -> Self {
        if filename.to_ascii_lowercase().ends_with(".pdf") {
            DocumentKind::Pdf
        } else {
            DocumentKind::Image
        }
    }
}

/// A file received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        DocumentKind::from_filename(&self.filename)
    }

    /// Extension used for the scratch copy.
    ///
    /// Client filenames are never used as paths; only a short alphanumeric
    /// extension survives.
    fn scratch_extension(&self) -> String {
        if self.kind() == DocumentKind::Pdf {
            return "pdf".to_string();
        }
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "jpg".to_string())
    }
}

/// Per-request scratch directory, removed on drop.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a fresh directory under `root`, or the OS temp dir when `None`.
    pub fn create(root: Option<&Path>) -> Result<Self, ParseError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("iddoc-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| ParseError::Scratch {
            path: root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
            source: e,
        })?;
        debug!("Scratch space: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the upload into scratch and return its path.
    pub async fn save_upload(&self, upload: &Upload) -> Result<PathBuf, ParseError> {
        let path = self
            .dir
            .path()
            .join(format!("upload.{}", upload.scratch_extension()));
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|e| ParseError::Scratch {
                path: path.clone(),
                source: e,
            })?;
        debug!("Saved upload '{}' → {}", upload.filename, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_suffix_is_case_insensitive() {
        assert_eq!(DocumentKind::from_filename("scan.pdf"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("SCAN.PDF"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("a.b.Pdf"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("passport.jpg"), DocumentKind::Image);
        assert_eq!(DocumentKind::from_filename("pdf"), DocumentKind::Image);
        assert_eq!(DocumentKind::from_filename("report.pdf.png"), DocumentKind::Image);
    }

    #[test]
    fn scratch_extension_is_sanitised() {
        assert_eq!(Upload::new("x.PDF", vec![]).scratch_extension(), "pdf");
        assert_eq!(Upload::new("x.PNG", vec![]).scratch_extension(), "png");
        assert_eq!(Upload::new("noext", vec![]).scratch_extension(), "jpg");
        assert_eq!(Upload::new("x.../../etc", vec![]).scratch_extension(), "jpg");
    }

    #[tokio::test]
    async fn scratch_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::create(Some(root.path())).unwrap();
        let saved = scratch
            .save_upload(&Upload::new("id.jpeg", b"\xFF\xD8\xFF".to_vec()))
            .await
            .unwrap();
        assert!(saved.exists());
        assert_eq!(saved.file_name().unwrap(), "upload.jpeg");
        assert!(saved.starts_with(root.path()));

        let dir = scratch.path().to_path_buf();
        drop(scratch);
        assert!(!dir.exists());
        assert!(!saved.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
