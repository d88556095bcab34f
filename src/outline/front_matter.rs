//! Title and abstract heuristics.

use super::{collapse_whitespace, non_empty_lines, HeadingCatalog};
use crate::document::Page;
use once_cell::sync::Lazy;
use regex::Regex;

/// Only this many leading non-empty lines of page 1 are title candidates.
pub const TITLE_SCAN_LINES: usize = 15;

/// Lines shorter than this (in characters) are never the title.
pub const TITLE_MIN_CHARS: usize = 8;

/// Substrings (lower-case) that mark a line as venue or front-matter noise.
pub const TITLE_BLACKLIST: [&str; 5] = ["abstract", "arxiv", "proceedings", "conference", "journal"];

static RE_NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+)*\s+").unwrap());
static RE_ABSTRACT_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^abstract\s*$").unwrap());

/// Guess the paper title from the first page.
///
/// Titles are usually the most prominent line before author and venue noise,
/// which in extracted text shows up as the longest early line. Returns the
/// longest surviving line (first one on ties), or `None`.
pub fn guess_title(pages: &[Page]) -> Option<String> {
    let first = pages.first()?;

    let mut best: Option<(&str, usize)> = None;
    for line in non_empty_lines(&first.text).take(TITLE_SCAN_LINES) {
        if !is_title_candidate(line) {
            continue;
        }
        let len = line.chars().count();
        if best.is_none_or(|(_, best_len)| len > best_len) {
            best = Some((line, len));
        }
    }

    best.map(|(line, _)| line.to_string())
}

fn is_title_candidate(line: &str) -> bool {
    let lower = line.to_lowercase();
    if TITLE_BLACKLIST.iter().any(|word| lower.contains(word)) {
        return false;
    }
    if line.chars().count() < TITLE_MIN_CHARS {
        return false;
    }
    !RE_NUMBERED_LINE.is_match(line)
}

/// Extract the abstract body.
///
/// Finds the first line that is exactly "Abstract" anywhere in the document
/// and collects the following lines until another catalog heading. A repeated
/// bare "Abstract" line does not end the abstract.
pub fn extract_abstract(pages: &[Page], catalog: &HeadingCatalog) -> Option<String> {
    let mut lines = pages.iter().flat_map(|p| non_empty_lines(&p.text));

    lines.by_ref().find(|line| RE_ABSTRACT_HEADER.is_match(line))?;

    let body: Vec<&str> = lines
        .take_while(|line| RE_ABSTRACT_HEADER.is_match(line) || !catalog.is_heading(line))
        .collect();

    let text = collapse_whitespace(&body.join(" "));
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
