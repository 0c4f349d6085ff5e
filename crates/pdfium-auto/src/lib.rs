//! # pdfium-auto
//!
//! Locate, or fetch on first use, the [PDFium](https://pdfium.googlesource.com/pdfium/)
//! shared library that `pdfium-render` binds to, so a fresh host can serve
//! PDF uploads without a manual install step.
//!
//! ## Resolution order
//!
//! 1. `PDFIUM_LIB_PATH`, when it names an existing file.
//! 2. The per-version cache dir (see [`pdfium_cache_dir`]).
//! 3. Download the platform archive from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries),
//!    unpack the library into the cache dir, and use that.
//!
//! The result is memoised for the life of the process. Resolution blocks
//! (network and disk), so async callers run it on the blocking pool.
//!
//! ```rust,no_run
//! let path = pdfium_auto::ensure_pdfium_library().expect("pdfium unavailable");
//! let pdfium = pdfium_auto::bind_pdfium_from_path(&path).expect("bind failed");
//! ```
//!
//! ## Environment variable overrides
//!
//! - `PDFIUM_LIB_PATH`: path to an existing pdfium library; skips download.
//! - `PDFIUM_AUTO_CACHE_DIR`: override the default cache directory.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pdfium_render::prelude::Pdfium;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The pdfium-binaries release tag used for downloads.
pub const PDFIUM_VERSION: &str = "7690";

const BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Application directory inside the user cache dir.
const CACHE_APP_DIR: &str = "iddoc-extract";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned while locating or loading pdfium.
#[derive(Error, Debug)]
pub enum PdfiumAutoError {
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Cache directory error at '{path}': {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Archive extraction failed: {0}")]
    Extract(String),

    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

// ── Platform table ───────────────────────────────────────────────────────────

/// Release asset layout for one OS/arch pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Platform {
    os: &'static str,
    arch: &'static str,
    /// Asset suffix: `pdfium-{asset}.tgz`.
    asset: &'static str,
    /// Directory holding the library inside the archive.
    archive_dir: &'static str,
    lib_name: &'static str,
}

const PLATFORMS: &[Platform] = &[
    Platform { os: "macos", arch: "aarch64", asset: "mac-arm64", archive_dir: "lib", lib_name: "libpdfium.dylib" },
    Platform { os: "macos", arch: "x86_64", asset: "mac-x64", archive_dir: "lib", lib_name: "libpdfium.dylib" },
    Platform { os: "linux", arch: "x86_64", asset: "linux-x64", archive_dir: "lib", lib_name: "libpdfium.so" },
    Platform { os: "linux", arch: "aarch64", asset: "linux-arm64", archive_dir: "lib", lib_name: "libpdfium.so" },
    Platform { os: "windows", arch: "x86_64", asset: "win-x64", archive_dir: "bin", lib_name: "pdfium.dll" },
    Platform { os: "windows", arch: "aarch64", asset: "win-arm64", archive_dir: "bin", lib_name: "pdfium.dll" },
];

impl Platform {
    fn lookup(os: &str, arch: &str) -> Result<Platform, PdfiumAutoError> {
        PLATFORMS
            .iter()
            .copied()
            .find(|p| p.os == os && p.arch == arch)
            .ok_or_else(|| PdfiumAutoError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
    }

    fn current() -> Result<Platform, PdfiumAutoError> {
        Self::lookup(std::env::consts::OS, std::env::consts::ARCH)
    }

    fn download_url(&self) -> String {
        format!("{BASE_URL}/chromium%2F{PDFIUM_VERSION}/pdfium-{}.tgz", self.asset)
    }

    fn path_in_archive(&self) -> String {
        format!("{}/{}", self.archive_dir, self.lib_name)
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Per-version cache directory for the library.
///
/// `PDFIUM_AUTO_CACHE_DIR` replaces the user cache dir as the base; the
/// version subdirectory is always appended.
pub fn pdfium_cache_dir() -> PathBuf {
    let base = match std::env::var_os("PDFIUM_AUTO_CACHE_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
            .unwrap_or_else(std::env::temp_dir)
            .join(CACHE_APP_DIR),
    };
    base.join(format!("pdfium-{PDFIUM_VERSION}"))
}

/// Path to the pdfium library, downloading it on first use.
///
/// Safe to call from several threads; later calls return the memoised path.
pub fn ensure_pdfium_library() -> Result<PathBuf, PdfiumAutoError> {
    static RESOLVED: OnceLock<PathBuf> = OnceLock::new();

    if let Some(path) = RESOLVED.get() {
        return Ok(path.clone());
    }
    let path = match local_library() {
        Some(path) => path,
        None => download_library(Platform::current()?, &pdfium_cache_dir())?,
    };
    info!("Using pdfium library at {}", path.display());
    Ok(RESOLVED.get_or_init(|| path).clone())
}

/// Load the pdfium library at `path`.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, PdfiumAutoError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

/// Env override or cached copy, if either exists.
fn local_library() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from) {
        if p.is_file() {
            return Some(p);
        }
        warn!("PDFIUM_LIB_PATH '{}' does not exist; ignoring", p.display());
    }
    let cached = pdfium_cache_dir().join(Platform::current().ok()?.lib_name);
    cached.is_file().then_some(cached)
}

fn download_library(platform: Platform, cache_dir: &Path) -> Result<PathBuf, PdfiumAutoError> {
    std::fs::create_dir_all(cache_dir).map_err(|source| PdfiumAutoError::CacheDir {
        path: cache_dir.to_path_buf(),
        source,
    })?;

    let url = platform.download_url();
    info!("Downloading pdfium from {}", url);
    let archive = fetch(&url)?;
    debug!("Fetched {} bytes", archive.len());

    let dest = cache_dir.join(platform.lib_name);
    extract_library(&archive, &platform.path_in_archive(), &dest)?;
    Ok(dest)
}

fn fetch(url: &str) -> Result<Vec<u8>, PdfiumAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PdfiumAutoError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| PdfiumAutoError::Download(format!("GET {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(PdfiumAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let mut buf = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
    response
        .read_to_end(&mut buf)
        .map_err(|e| PdfiumAutoError::Download(format!("Read error: {e}")))?;
    Ok(buf)
}

/// Unpack `wanted` from a `.tgz` into `dest`.
///
/// The file is unpacked beside `dest` and renamed into place, so a
/// concurrent reader never sees a half-written library.
fn extract_library(archive: &[u8], wanted: &str, dest: &Path) -> Result<(), PdfiumAutoError> {
    let extract_err = |e: std::io::Error| PdfiumAutoError::Extract(e.to_string());
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(archive));

    for entry in tar.entries().map_err(extract_err)? {
        let mut entry = entry.map_err(extract_err)?;
        if entry.path().map_err(extract_err)?.as_os_str() != wanted {
            continue;
        }
        let partial = dest.with_extension("partial");
        entry
            .unpack(&partial)
            .map_err(|e| PdfiumAutoError::Extract(format!("Unpack failed: {e}")))?;
        std::fs::rename(&partial, dest).map_err(extract_err)?;
        return Ok(());
    }

    Err(PdfiumAutoError::Extract(format!(
        "'{wanted}' not found in archive"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn tgz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn platform_lookup() {
        let linux = Platform::lookup("linux", "x86_64").unwrap();
        assert_eq!(linux.path_in_archive(), "lib/libpdfium.so");
        assert!(linux
            .download_url()
            .ends_with("/chromium%2F7690/pdfium-linux-x64.tgz"));

        let win = Platform::lookup("windows", "aarch64").unwrap();
        assert_eq!(win.path_in_archive(), "bin/pdfium.dll");

        assert!(matches!(
            Platform::lookup("plan9", "mips"),
            Err(PdfiumAutoError::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn cache_dir_is_versioned() {
        let dir = pdfium_cache_dir();
        assert!(dir.ends_with(format!("pdfium-{PDFIUM_VERSION}")));
    }

    #[test]
    fn extracts_only_the_wanted_entry() {
        let archive = tgz(&[
            ("include/fpdfview.h", b"header"),
            ("lib/libpdfium.so", b"\x7fELF-library"),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("libpdfium.so");

        extract_library(&archive, "lib/libpdfium.so", &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"\x7fELF-library");
        assert!(!dest.with_extension("partial").exists());
    }

    #[test]
    fn missing_entry_is_an_error() {
        let archive = tgz(&[("lib/other.so", b"x")]);
        let dir = tempfile::tempdir().unwrap();
        let err = extract_library(&archive, "lib/libpdfium.so", &dir.path().join("l.so"))
            .unwrap_err();
        assert!(err.to_string().contains("not found in archive"));
    }
}
