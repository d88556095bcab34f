//! Heading candidate detection.
//!
//! A line is a heading candidate when, on its own, it is a catalog section
//! name with an optional numeric prefix. The detector only reports lines that
//! are literally present; headings with unusual formatting ("III. RESULTS",
//! "Results and Analysis") are missed, which is expected behaviour.

use super::{collapse_whitespace, non_empty_lines, HeadingCandidate, HeadingCatalog};
use crate::document::Page;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static RE_NUMERIC_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+)*\s*").unwrap());

/// Scan every page for heading lines.
///
/// Candidates are returned in discovery order (page order, then line order).
/// A heading whose normalised form repeats on the same page (a running header,
/// a table-of-contents line) is reported once, at its first occurrence.
pub fn detect_headings(pages: &[Page], catalog: &HeadingCatalog) -> Vec<HeadingCandidate> {
    let mut seen: HashSet<(usize, String)> = HashSet::new();
    let mut candidates = Vec::new();

    for page in pages {
        for line in non_empty_lines(&page.text) {
            if !catalog.is_heading(line) {
                continue;
            }
            let normalized = normalize_heading(line);
            if !seen.insert((page.page_number, normalized.clone())) {
                continue;
            }
            candidates.push(HeadingCandidate {
                page: page.page_number,
                raw_heading: line.to_string(),
                normalized_heading: normalized,
                snippet: line.to_string(),
            });
        }
    }

    candidates
}

/// Strip a leading section number, collapse whitespace and title-case.
///
/// `"3.2   related   WORK"` → `"Related Work"`.
pub fn normalize_heading(text: &str) -> String {
    let stripped = RE_NUMERIC_PREFIX.replace(text.trim(), "");
    title_case(&collapse_whitespace(&stripped))
}

/// Upper-case the first letter of every word and lower-case the rest. A word
/// starts after any non-alphabetic character.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for ch in text.chars() {
        if in_word {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        in_word = ch.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::test_support::pages;

    fn detect(texts: &[&str]) -> Vec<HeadingCandidate> {
        detect_headings(&pages(texts), HeadingCatalog::default_catalog())
    }

    #[test]
    fn normalizes_numbered_headings() {
        assert_eq!(normalize_heading("3.2 Results"), "Results");
        assert_eq!(normalize_heading("  1   INTRODUCTION "), "Introduction");
        assert_eq!(normalize_heading("2 related   work"), "Related Work");
        assert_eq!(normalize_heading("Abstract"), "Abstract");
    }

    #[test]
    fn title_case_follows_word_boundaries() {
        assert_eq!(title_case("future work"), "Future Work");
        assert_eq!(title_case("EXPERIMENTAL SETUP"), "Experimental Setup");
        assert_eq!(title_case("x-ray"), "X-Ray");
    }

    #[test]
    fn records_raw_line_and_snippet() {
        let found = detect(&["Title\n  4 Experiments  \nbody"]);
        assert_eq!(found.len(), 1);
        let c = &found[0];
        assert_eq!(c.page, 1);
        assert_eq!(c.raw_heading, "4 Experiments");
        assert_eq!(c.snippet, c.raw_heading);
        assert_eq!(c.normalized_heading, "Experiments");
    }

    #[test]
    fn dedupes_same_heading_on_same_page() {
        let found = detect(&["Results\ntext\n5 RESULTS\nResults", "Results"]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].page, 1);
        assert_eq!(found[0].raw_heading, "Results");
        assert_eq!(found[1].page, 2);
    }

    #[test]
    fn ignores_prose_and_blank_lines() {
        let found = detect(&["\n\n   \nIn this introduction we\nResults are shown below"]);
        assert!(found.is_empty());
    }

    #[test]
    fn detection_is_idempotent() {
        let input = pages(&["Abstract\nx\n1 Introduction", "2 Method\nMethod\n3 Results"]);
        let catalog = HeadingCatalog::default_catalog();
        let first = detect_headings(&input, catalog);
        let second = detect_headings(&input, catalog);
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn handles_crlf_text() {
        let found = detect(&["Introduction\r\nbody\r\nConclusion\r\n"]);
        let names: Vec<_> = found.iter().map(|c| c.normalized_heading.as_str()).collect();
        assert_eq!(names, vec!["Introduction", "Conclusion"]);
    }
}
