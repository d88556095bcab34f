//! Merge a model-refined outline back into the heuristic one.
//!
//! The merge is structural: title, authors, keywords and sections come from
//! the refinement verbatim, while the heuristic abstract and the full
//! candidate list are carried over so the refined sections stay auditable
//! against what the detector actually saw.
//!
//! Validation is a separate step ([`validate_refinement`]); whether its
//! findings block the merge is decided by [`RefinementPolicy`] in the refine
//! stage, never here.

use super::{Outline, Section};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The refinement payload returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineRefinement {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sections: Vec<Section>,
}

/// Treat an explicit JSON `null` the same as an omitted field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Build the reconciled outline.
///
/// `abstract` and `section_candidates` come from `prior`; everything else
/// from `refinement`. No consistency checks are made.
pub fn apply_refinement(prior: &Outline, refinement: OutlineRefinement) -> Outline {
    Outline {
        title: refinement.title,
        authors: refinement.authors,
        abstract_text: prior.abstract_text.clone(),
        keywords: refinement.keywords,
        section_candidates: prior.section_candidates.clone(),
        sections: refinement.sections,
    }
}

/// What to do when a refinement fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RefinementPolicy {
    /// Reject refinements with range or ordering problems; the heuristic
    /// outline stays in place. (default)
    #[default]
    Strict,
    /// Log every issue and merge anyway.
    Trust,
}

/// A structural problem in a refined section list. `index` is 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefinementIssue {
    /// `start_page > end_page`.
    InvertedRange { index: usize, start: usize, end: usize },
    /// A page number outside `1..=page_count`.
    PageOutOfBounds { index: usize, page: usize, page_count: usize },
    /// Starts before the previous section starts.
    OutOfOrder { index: usize, start: usize, prev_start: usize },
    /// Starts on or before the previous section's last page.
    Overlap { index: usize, start: usize, prev_end: usize },
    /// Name does not correspond to any detected heading.
    UnknownName { index: usize, name: String },
    /// No `trace`, so the section cannot be audited against the page text.
    MissingTrace { index: usize },
}

impl RefinementIssue {
    /// Range, ordering and provenance problems are structural; an unknown
    /// name is not.
    pub fn is_structural(&self) -> bool {
        !matches!(self, RefinementIssue::UnknownName { .. })
    }
}

impl fmt::Display for RefinementIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefinementIssue::InvertedRange { index, start, end } => {
                write!(f, "section {} ends (p.{end}) before it starts (p.{start})", index + 1)
            }
            RefinementIssue::PageOutOfBounds { index, page, page_count } => write!(
                f,
                "section {} references page {page} outside 1..={page_count}",
                index + 1
            ),
            RefinementIssue::OutOfOrder { index, start, prev_start } => write!(
                f,
                "section {} starts on p.{start}, before section {} (p.{prev_start})",
                index + 1,
                index
            ),
            RefinementIssue::Overlap { index, start, prev_end } => write!(
                f,
                "section {} starts on p.{start} but section {} runs to p.{prev_end}",
                index + 1,
                index
            ),
            RefinementIssue::UnknownName { index, name } => {
                write!(f, "section {} '{name}' is not among the detected headings", index + 1)
            }
            RefinementIssue::MissingTrace { index } => {
                write!(f, "section {} has no trace", index + 1)
            }
        }
    }
}

/// Check a refinement's sections against the document.
///
/// `candidate_names` are the detector's normalised headings; names are
/// compared case-insensitively. An empty list disables the name check.
pub fn validate_refinement(
    refinement: &OutlineRefinement,
    candidate_names: &[&str],
    page_count: usize,
) -> Vec<RefinementIssue> {
    let known: HashSet<String> = candidate_names.iter().map(|n| n.to_lowercase()).collect();
    let mut issues = Vec::new();

    for (index, section) in refinement.sections.iter().enumerate() {
        let (start, end) = (section.start_page, section.end_page);

        if start > end {
            issues.push(RefinementIssue::InvertedRange { index, start, end });
        }
        for page in [start, end] {
            if page == 0 || page > page_count {
                issues.push(RefinementIssue::PageOutOfBounds {
                    index,
                    page,
                    page_count,
                });
            }
        }
        if let Some(prev) = index.checked_sub(1).map(|i| &refinement.sections[i]) {
            if start < prev.start_page {
                issues.push(RefinementIssue::OutOfOrder {
                    index,
                    start,
                    prev_start: prev.start_page,
                });
            } else if start <= prev.end_page {
                issues.push(RefinementIssue::Overlap {
                    index,
                    start,
                    prev_end: prev.end_page,
                });
            }
        }
        if section.trace.is_none() {
            issues.push(RefinementIssue::MissingTrace { index });
        }
        if !known.is_empty() && !known.contains(&section.name.trim().to_lowercase()) {
            issues.push(RefinementIssue::UnknownName {
                index,
                name: section.name.clone(),
            });
        }
    }

    issues
}
