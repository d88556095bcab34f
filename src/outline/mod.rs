//! Outline inference: recover a paper's logical structure from page text.
//!
//! Extracted PDF text carries no markup, so the outline is rebuilt from
//! heuristics and later corrected by a model:
//!
//! ```text
//! pages ──▶ headings ──┬──▶ front_matter (title, abstract)
//!                      └──▶ sections (page ranges)
//!                                 │
//!            model refinement ──▶ reconcile ──▶ Outline
//! ```
//!
//! 1. [`headings`] - match lines against the [`catalog`], dedupe per page
//! 2. [`front_matter`] - longest-line title guess, abstract body
//! 3. [`sections`] - turn ordered headings into inclusive page ranges
//! 4. [`reconcile`] - merge the refined outline while keeping the
//!    heuristic abstract and the candidate list for audit
//!
//! Everything in this module is pure and synchronous. The model call lives in
//! [`crate::pipeline::refine`].

pub mod catalog;
pub mod front_matter;
pub mod headings;
pub mod reconcile;
pub mod sections;

use crate::document::Page;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

pub use catalog::{CatalogEntry, HeadingCatalog};
pub use front_matter::{extract_abstract, guess_title};
pub use headings::{detect_headings, normalize_heading};
pub use reconcile::{
    apply_refinement, validate_refinement, OutlineRefinement, RefinementIssue, RefinementPolicy,
};
pub use sections::build_sections;

/// Where an extracted fact came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(deserialize_with = "lenient_page")]
    pub page: usize,
    pub snippet: String,
}

/// A line heuristically identified as a section title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingCandidate {
    /// 1-indexed page the line was found on.
    pub page: usize,
    /// The trimmed line as it appeared in the text.
    pub raw_heading: String,
    /// Numeric prefix removed, whitespace collapsed, title-cased.
    pub normalized_heading: String,
    /// Provenance snippet; identical to `raw_heading`.
    pub snippet: String,
}

/// A named section with an inclusive page range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// `"S1"`, `"S2"`, … for heuristic sections. Refined sections keep
    /// whatever id the refinement supplied, usually none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    pub name: String,
    #[serde(deserialize_with = "lenient_page")]
    pub start_page: usize,
    #[serde(deserialize_with = "lenient_page")]
    pub end_page: usize,
    /// Always set on heuristic sections. A refinement may omit it; see
    /// [`RefinementIssue::MissingTrace`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Trace>,
}

/// Page numbers as models write them: `3`, `3.0` or `"3"`.
fn lenient_page<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPage {
        Int(u64),
        Float(f64),
        Text(String),
    }

    let invalid = |shown: String| D::Error::custom(format!("invalid page number {shown}"));
    match RawPage::deserialize(deserializer)? {
        RawPage::Int(n) => usize::try_from(n).map_err(|_| invalid(n.to_string())),
        RawPage::Float(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => {
            Ok(f as usize)
        }
        RawPage::Float(f) => Err(invalid(f.to_string())),
        RawPage::Text(s) => s.trim().parse().map_err(|_| invalid(format!("'{s}'"))),
    }
}

impl Section {
    /// Whether `page` falls inside this section's inclusive range.
    pub fn contains_page(&self, page: usize) -> bool {
        self.start_page <= page && page <= self.end_page
    }
}

/// The inferred logical structure of a paper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Every heading the detector found. Kept through refinement so the
    /// refined sections can be audited against what was actually on the page.
    #[serde(default)]
    pub section_candidates: Vec<HeadingCandidate>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Outline {
    /// `true` when no section structure was recovered. Downstream stages
    /// treat this as "unstructured document" and fall back to page windows.
    pub fn is_unstructured(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Build the heuristic outline for one document.
///
/// `page_count` is the document's page count as reported by extraction; it
/// bounds the last section's range. Authors and keywords are left empty for
/// the refinement step to fill.
pub fn infer_outline(pages: &[Page], page_count: usize, catalog: &HeadingCatalog) -> Outline {
    let section_candidates = detect_headings(pages, catalog);
    let sections = build_sections(&section_candidates, page_count);

    Outline {
        title: guess_title(pages),
        authors: Vec::new(),
        abstract_text: extract_abstract(pages, catalog),
        keywords: Vec::new(),
        section_candidates,
        sections,
    }
}

/// Trimmed, non-empty lines of a page's text.
pub(crate) fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(str::trim).filter(|l| !l.is_empty())
}

/// Collapse every whitespace run to a single space and trim the ends.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
