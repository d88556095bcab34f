//! The paper's cumulative structured record.
//!
//! Every stage loads the previous stage's [`PaperDocument`], adds its own
//! fields and persists the whole record again. Fields this crate does not
//! know about are kept in [`PaperDocument::extra`] so hand-added or
//! third-party annotations survive a round-trip.

use crate::error::PaperError;
use crate::outline::Outline;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Schema tag written by stage 1.
pub const SCHEMA_VERSION: &str = "paper-extract-v1";

/// One page of extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub page_id: String,
    /// 1-indexed.
    pub page_number: usize,
    pub text: String,
    #[serde(default)]
    pub char_count: usize,
    #[serde(default)]
    pub word_count: usize,
}

impl Page {
    /// Build a page and derive its id and counts from `text`.
    pub fn new(page_number: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            page_id: format!("P{page_number}"),
            page_number,
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            text,
        }
    }
}

/// Where the document came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub file_name: String,
    pub file_path: String,
    #[serde(default = "default_file_type")]
    pub file_type: String,
    pub page_count: usize,
    #[serde(default)]
    pub extracted_at: Option<String>,
}

fn default_file_type() -> String {
    "pdf".to_string()
}

/// Embedded PDF metadata, when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub title_guess: Option<String>,
    pub author_guess: Option<String>,
    pub creation_date: Option<String>,
}

/// An embedded image written to the assets directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figure {
    pub figure_id: String,
    pub page_number: usize,
    /// Relative to the output directory, e.g. `assets/fig_page3_2.png`.
    pub image_path: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Figure or table caption kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionKind {
    Figure,
    Table,
}

/// A caption line found in page text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caption {
    pub caption_id: String,
    pub page_number: usize,
    #[serde(rename = "type")]
    pub kind: CaptionKind,
    pub text: String,
}

/// Summary flags written by the extraction stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionNotes {
    pub has_images: bool,
    pub has_captions: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Pointer to the generated markdown report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRef {
    pub format: String,
    pub path: String,
    /// The report markdown itself, so the review stage does not depend on
    /// the file still being where it was written.
    #[serde(default)]
    pub content: String,
}

/// The cumulative per-paper record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperDocument {
    #[serde(default)]
    pub schema_version: String,
    #[serde(default)]
    pub source: SourceInfo,
    #[serde(default)]
    pub metadata: PdfMetadata,
    pub pages: Vec<Page>,
    #[serde(default)]
    pub figures: Vec<Figure>,
    #[serde(default)]
    pub tables_raw: Vec<Value>,
    #[serde(default)]
    pub captions: Vec<Caption>,
    #[serde(default)]
    pub extraction_notes: ExtractionNotes,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<Outline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_report: Option<ReportRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<Value>,

    /// Which text-gathering strategy fed each prompt block, keyed by
    /// `"<stage>.<block>"`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub text_scopes: BTreeMap<String, String>,

    /// Unknown sibling fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaperDocument {
    /// Page count from the extraction metadata, falling back to the number of
    /// pages actually present.
    pub fn page_count(&self) -> usize {
        if self.source.page_count > 0 {
            self.source.page_count
        } else {
            self.pages.len()
        }
    }

    /// The outline, or [`PaperError::MissingField`] if stage 2 has not run.
    pub fn outline(&self) -> Result<&Outline, PaperError> {
        self.outline
            .as_ref()
            .ok_or(PaperError::MissingField { field: "outline" })
    }

    /// Best available display title.
    pub fn display_title(&self) -> String {
        self.outline
            .as_ref()
            .and_then(|o| o.title.clone())
            .filter(|t| !t.trim().is_empty())
            .or_else(|| Some(self.source.file_name.clone()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| "Unknown Paper".to_string())
    }

    /// Load a persisted document.
    ///
    /// A missing file, unparsable JSON, a record without `pages` or a page
    /// numbered 0 are all fatal: later stages cannot do anything useful with
    /// partial input.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PaperError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PaperError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => PaperError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => PaperError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let doc: PaperDocument =
            serde_json::from_slice(&bytes).map_err(|e| PaperError::MalformedDocument {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        if let Some(page) = doc.pages.iter().find(|p| p.page_number == 0) {
            return Err(PaperError::MalformedDocument {
                path: path.to_path_buf(),
                detail: format!("page '{}' has page_number 0; pages are 1-indexed", page.page_id),
            });
        }

        debug!("Loaded {} ({} pages)", path.display(), doc.pages.len());
        Ok(doc)
    }

    /// Drop everything stages 2 through 6 produced, keeping the stage 1
    /// record and unknown fields.
    pub fn clear_derived(&mut self) {
        self.outline = None;
        self.claims = None;
        self.method = None;
        self.experiments = None;
        self.explanation_report = None;
        self.review = None;
        self.text_scopes.clear();
    }

    /// Persist as pretty JSON, atomically replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PaperError> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| PaperError::Internal(format!("serialise document: {e}")))?;
        write_atomic(path, &json)?;
        debug!("Saved {} ({} bytes)", path.display(), json.len());
        Ok(())
    }
}

/// Write `bytes` to `path` via a temp file in the same directory + rename.
///
/// Readers never observe a half-written file, and a failure leaves whatever
/// was at `path` before untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PaperError> {
    let write_err = |source: std::io::Error| PaperError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::{infer_outline, HeadingCatalog};

    fn sample() -> PaperDocument {
        let pages = vec![
            Page::new(1, "A Study Of Things\nAbstract\nWe study things.\n1 Introduction\nHi."),
            Page::new(2, "2 Method\nSteps.\n3 Results\nNumbers."),
        ];
        let outline = infer_outline(&pages, 2, HeadingCatalog::default_catalog());
        PaperDocument {
            schema_version: SCHEMA_VERSION.into(),
            source: SourceInfo {
                file_name: "things.pdf".into(),
                file_path: "/tmp/things.pdf".into(),
                file_type: "pdf".into(),
                page_count: 2,
                extracted_at: Some("2026-01-01T00:00:00Z".into()),
            },
            pages,
            outline: Some(outline),
            ..Default::default()
        }
    }

    #[test]
    fn page_new_derives_counts() {
        let p = Page::new(3, "two words\n");
        assert_eq!(p.page_id, "P3");
        assert_eq!(p.char_count, 10);
        assert_eq!(p.word_count, 2);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/output_s2.json");
        let doc = sample();

        doc.save(&path).unwrap();
        let back = PaperDocument::load(&path).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let json = r#"{"pages": [], "custom_notes": {"reviewer": "me"}}"#;
        let doc: PaperDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.extra["custom_notes"]["reviewer"], "me");
        let again = serde_json::to_value(&doc).unwrap();
        assert_eq!(again["custom_notes"]["reviewer"], "me");
        assert!(again.get("outline").is_none());
    }

    #[test]
    fn load_missing_file_is_fatal() {
        let err = PaperDocument::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, PaperError::FileNotFound { .. }));
    }

    #[test]
    fn load_rejects_malformed_json_and_missing_pages() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(matches!(
            PaperDocument::load(&bad).unwrap_err(),
            PaperError::MalformedDocument { .. }
        ));

        let no_pages = dir.path().join("no_pages.json");
        std::fs::write(&no_pages, r#"{"source": {"file_name": "x", "file_path": "x", "page_count": 1}}"#)
            .unwrap();
        assert!(matches!(
            PaperDocument::load(&no_pages).unwrap_err(),
            PaperError::MalformedDocument { .. }
        ));
    }

    #[test]
    fn load_rejects_page_number_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.json");
        std::fs::write(
            &path,
            r#"{"pages": [{"page_id": "P0", "page_number": 0, "text": "x"}]}"#,
        )
        .unwrap();
        match PaperDocument::load(&path).unwrap_err() {
            PaperError::MalformedDocument { detail, .. } => assert!(detail.contains("P0")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn clear_derived_keeps_extraction_and_extras() {
        let mut doc = sample();
        doc.claims = Some(serde_json::json!({"key_claims": []}));
        doc.review = Some(serde_json::json!({"overall": "ok"}));
        doc.text_scopes.insert("claims.intro".into(), "section".into());
        doc.extra.insert("custom_notes".into(), "keep".into());

        doc.clear_derived();

        assert_eq!(doc.outline, None);
        assert_eq!(doc.claims, None);
        assert_eq!(doc.review, None);
        assert!(doc.text_scopes.is_empty());
        assert_eq!(doc.pages, sample().pages);
        assert_eq!(doc.extra["custom_notes"], "keep");
    }

    #[test]
    fn page_count_falls_back_to_pages() {
        let mut doc = sample();
        assert_eq!(doc.page_count(), 2);
        doc.source.page_count = 0;
        doc.pages.push(Page::new(3, ""));
        assert_eq!(doc.page_count(), 3);
    }

    #[test]
    fn display_title_fallbacks() {
        let mut doc = sample();
        assert_eq!(doc.display_title(), "A Study Of Things");
        doc.outline.as_mut().unwrap().title = None;
        assert_eq!(doc.display_title(), "things.pdf");
        doc.source.file_name.clear();
        assert_eq!(doc.display_title(), "Unknown Paper");
    }

    #[test]
    fn write_atomic_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        write_atomic(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "temp file must not be left behind");
    }
}
