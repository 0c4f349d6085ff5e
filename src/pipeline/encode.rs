//! Image encoding: image file → base64 payload wrapped in `ImageData`.
//!
//! Images are forwarded byte-for-byte; rendered PDF pages are already PNG.
//! Only the MIME type is worked out, from the bytes first and the filename
//! second.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::path::Path;
use tracing::debug;

/// MIME type sent when neither content nor extension identify the image.
pub const FALLBACK_MIME: &str = "image/png";

/// Detect the MIME type of an image from its bytes, then its file name.
pub fn detect_mime(bytes: &[u8], path: &Path) -> &'static str {
    image::guess_format(bytes)
        .or_else(|_| image::ImageFormat::from_path(path))
        .map(|f| f.to_mime_type())
        .unwrap_or(FALLBACK_MIME)
}

/// Encode raw image bytes for the multimodal request.
///
/// Sent with `detail: "high"`; MRZ lines are unreadable at low detail.
pub fn encode_image(bytes: &[u8], path: &Path) -> ImageData {
    let mime = detect_mime(bytes, path);
    let b64 = STANDARD.encode(bytes);
    debug!(
        "Encoded {} ({}) → {} bytes base64",
        path.display(),
        mime,
        b64.len()
    );
    ImageData::new(b64, mime).with_detail("high")
}

/// Read an image from scratch storage and encode it.
pub async fn encode_file(path: &Path) -> std::io::Result<ImageData> {
    let bytes = tokio::fs::read(path).await?;
    Ok(encode_image(&bytes, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn content_wins_over_extension() {
        let png = encoded(ImageFormat::Png);
        assert_eq!(detect_mime(&png, Path::new("upload.jpg")), "image/png");
        let jpeg = encoded(ImageFormat::Jpeg);
        assert_eq!(detect_mime(&jpeg, Path::new("upload.png")), "image/jpeg");
    }

    #[test]
    fn extension_then_fallback() {
        assert_eq!(detect_mime(b"????", Path::new("scan.jpeg")), "image/jpeg");
        assert_eq!(detect_mime(b"????", Path::new("scan")), FALLBACK_MIME);
    }

    #[test]
    fn payload_is_base64_of_the_original_bytes() {
        let png = encoded(ImageFormat::Png);
        let data = encode_image(&png, Path::new("page-001.png"));
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), png);
    }

    #[tokio::test]
    async fn encode_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page-001.png");
        std::fs::write(&path, encoded(ImageFormat::Png)).unwrap();
        let data = encode_file(&path).await.unwrap();
        assert_eq!(data.mime_type, "image/png");
        assert!(encode_file(&dir.path().join("missing.png")).await.is_err());
    }
}
