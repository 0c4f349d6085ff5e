//! PDF rasterisation: render every page to a PNG file via pdfium.
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-aware, so [`rasterize_pdf`] runs the whole render on Tokio's
//! blocking pool. Pages are rendered at a fixed zoom factor
//! (`render_scale`, 2× by default) rather than to a pixel target.

use crate::error::{ParseError, RasterizeError};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns a PDF on disk into one image file per page.
///
/// Implementations are synchronous and are always invoked on the blocking
/// pool by [`rasterize_pdf`].
pub trait PageRasterizer: Send + Sync {
    /// Render every page of `pdf_path` into `out_dir`.
    ///
    /// Returns page image paths in page order. An empty document is an error,
    /// never an empty vector.
    fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, RasterizeError>;
}

/// File name for a rendered page (1-indexed).
pub fn page_file_name(page_number: usize) -> String {
    format!("page-{page_number:03}.png")
}

/// Run `rasterizer` on the blocking pool.
///
/// A missing or unloadable pdfium library is a server fault
/// ([`ParseError::Internal`]); every other renderer failure is about the
/// uploaded document ([`ParseError::Rasterization`]).
pub async fn rasterize_pdf(
    rasterizer: &Arc<dyn PageRasterizer>,
    pdf_path: &Path,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, ParseError> {
    let rasterizer = Arc::clone(rasterizer);
    let pdf = pdf_path.to_path_buf();
    let out = out_dir.to_path_buf();

    let pages = tokio::task::spawn_blocking(move || rasterizer.rasterize(&pdf, &out))
        .await
        .map_err(|e| ParseError::Internal(format!("Render task panicked: {e}")))?
        .map_err(|e| match e {
            RasterizeError::Binding(detail) => {
                ParseError::Internal(format!("pdfium unavailable: {detail}"))
            }
            other => ParseError::Rasterization(other),
        })?;

    if pages.is_empty() {
        return Err(ParseError::Rasterization(RasterizeError::NoPages {
            path: pdf_path.to_path_buf(),
        }));
    }
    Ok(pages)
}

/// [`PageRasterizer`] backed by a pdfium shared library.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library_path: PathBuf,
    scale: f32,
}

impl PdfiumRasterizer {
    /// `library_path` is usually the result of
    /// [`pdfium_auto::ensure_pdfium_library`].
    pub fn new(library_path: impl Into<PathBuf>, scale: f32) -> Self {
        Self {
            library_path: library_path.into(),
            scale,
        }
    }

    fn bind(&self) -> Result<Pdfium, RasterizeError> {
        pdfium_auto::bind_pdfium_from_path(&self.library_path)
            .map_err(|e| RasterizeError::Binding(e.to_string()))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, RasterizeError> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| RasterizeError::Open {
                path: pdf_path.to_path_buf(),
                detail: format!("{e:?}"),
            })?;

        let pages = document.pages();
        let total = pages.len() as usize;
        if total == 0 {
            return Err(RasterizeError::NoPages {
                path: pdf_path.to_path_buf(),
            });
        }
        info!("PDF loaded: {} pages", total);

        let render_config = PdfRenderConfig::new().scale_page_by_factor(self.scale);
        let mut paths = Vec::with_capacity(total);

        for (idx, page) in pages.iter().enumerate() {
            let page_number = idx + 1;
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| RasterizeError::Render {
                    page: page_number,
                    detail: format!("{e:?}"),
                })?;

            let image = bitmap.as_image();
            let path = out_dir.join(page_file_name(page_number));
            image
                .save_with_format(&path, image::ImageFormat::Png)
                .map_err(|e| RasterizeError::WriteImage {
                    page: page_number,
                    detail: e.to_string(),
                })?;

            debug!(
                "Rendered page {} → {}x{} px ({})",
                page_number,
                image.width(),
                image.height(),
                path.display()
            );
            paths.push(path);
        }

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<PathBuf>);

    impl PageRasterizer for Fixed {
        fn rasterize(&self, _: &Path, _: &Path) -> Result<Vec<PathBuf>, RasterizeError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl PageRasterizer for Broken {
        fn rasterize(&self, p: &Path, _: &Path) -> Result<Vec<PathBuf>, RasterizeError> {
            Err(RasterizeError::Open {
                path: p.to_path_buf(),
                detail: "FormatError".into(),
            })
        }
    }

    struct Unbindable;

    impl PageRasterizer for Unbindable {
        fn rasterize(&self, _: &Path, _: &Path) -> Result<Vec<PathBuf>, RasterizeError> {
            Err(RasterizeError::Binding("libpdfium.so: cannot open shared object".into()))
        }
    }

    #[test]
    fn page_file_names_sort_in_page_order() {
        assert_eq!(page_file_name(1), "page-001.png");
        assert!(page_file_name(2) < page_file_name(10));
    }

    #[tokio::test]
    async fn empty_render_is_a_rasterization_error() {
        let r: Arc<dyn PageRasterizer> = Arc::new(Fixed(vec![]));
        let err = rasterize_pdf(&r, Path::new("a.pdf"), Path::new("."))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ParseError::Rasterization(RasterizeError::NoPages { .. })
        ));
    }

    #[tokio::test]
    async fn open_failure_maps_to_rasterization() {
        let r: Arc<dyn PageRasterizer> = Arc::new(Broken);
        let err = rasterize_pdf(&r, Path::new("a.pdf"), Path::new("."))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to extract pages from PDF");
    }

    #[tokio::test]
    async fn missing_library_is_a_server_fault() {
        let r: Arc<dyn PageRasterizer> = Arc::new(Unbindable);
        let err = rasterize_pdf(&r, Path::new("a.pdf"), Path::new("."))
            .await
            .unwrap_err();
        assert!(matches!(err, ParseError::Internal(_)));
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("cannot open shared object"));
    }

    #[tokio::test]
    async fn pages_are_returned_in_order() {
        let r: Arc<dyn PageRasterizer> = Arc::new(Fixed(vec![
            PathBuf::from("page-001.png"),
            PathBuf::from("page-002.png"),
        ]));
        let pages = rasterize_pdf(&r, Path::new("a.pdf"), Path::new("."))
            .await
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].ends_with("page-001.png"));
    }
}
