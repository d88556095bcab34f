//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! ## Why download to a temp file?
//!
//! pdfium opens documents by path. Downloading into a `TempDir` gives it one
//! while guaranteeing cleanup when [`ResolvedInput`] is dropped. PDF magic
//! bytes (`%PDF`) are checked up front so a mistyped URL that serves an HTML
//! error page fails with [`PaperError::NotAPdf`] instead of a pdfium error.
//!
//! A local `.json` file is accepted as an already-extracted stage-1 document;
//! the driver then skips extraction and resumes from it.

use crate::error::PaperError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// What the resolved file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// A PDF to extract.
    Pdf,
    /// A persisted [`crate::document::PaperDocument`] to resume from.
    StageDocument,
}

/// The resolved input: either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local { path: PathBuf, kind: InputKind },
    /// Input was a URL; PDF downloaded to a temp directory kept alive with it.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } => path,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn kind(&self) -> InputKind {
        match self {
            ResolvedInput::Local { kind, .. } => *kind,
            ResolvedInput::Downloaded { .. } => InputKind::Pdf,
        }
    }

    /// File name shown in reports and stored in `source.file_name`.
    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn is_stage_document(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Resolve the input string to a local file path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, PaperError> {
    if input.trim().is_empty() {
        return Err(PaperError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local path, validating existence and (for PDFs) magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, PaperError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(PaperError::FileNotFound { path });
    }

    let kind = if is_stage_document(&path) {
        InputKind::StageDocument
    } else {
        InputKind::Pdf
    };

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            if kind == InputKind::Pdf {
                let mut magic = [0u8; 4];
                if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                    return Err(PaperError::NotAPdf { path, magic });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PaperError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(PaperError::FileNotFound { path });
        }
    }

    debug!("Resolved local input ({:?}): {}", kind, path.display());
    Ok(ResolvedInput::Local { path, kind })
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, PaperError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| PaperError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PaperError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| PaperError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(PaperError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| PaperError::OutputWriteFailed {
            path: file_path.clone(),
            source: e,
        })?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment when it looks like a file name, else `paper.pdf`.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "paper.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://arxiv.org/pdf/1706.03762"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_falls_back() {
        assert_eq!(filename_from_url("https://x.org/papers/attn.pdf"), "attn.pdf");
        assert_eq!(filename_from_url("https://arxiv.org/pdf/1706"), "paper.pdf");
        assert_eq!(filename_from_url("https://x.org/"), "paper.pdf");
    }

    #[tokio::test]
    async fn local_pdf_and_json_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("a.pdf");
        std::fs::write(&pdf, b"%PDF-1.7\n").unwrap();
        let json = dir.path().join("output_s1.json");
        std::fs::write(&json, b"{\"pages\": []}").unwrap();

        let r = resolve_input(pdf.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(r.kind(), InputKind::Pdf);
        assert_eq!(r.file_name(), "a.pdf");

        let r = resolve_input(json.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(r.kind(), InputKind::StageDocument);
    }

    #[tokio::test]
    async fn rejects_missing_and_non_pdf_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.pdf");
        assert!(matches!(
            resolve_input(missing.to_str().unwrap(), 5).await,
            Err(PaperError::FileNotFound { .. })
        ));

        let html = dir.path().join("page.pdf");
        std::fs::write(&html, b"<html></html>").unwrap();
        match resolve_input(html.to_str().unwrap(), 5).await {
            Err(PaperError::NotAPdf { magic, .. }) => assert_eq!(&magic, b"<htm"),
            other => panic!("expected NotAPdf, got {:?}", other.err()),
        }

        assert!(matches!(
            resolve_input("  ", 5).await,
            Err(PaperError::InvalidInput { .. })
        ));
    }
}
