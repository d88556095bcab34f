//! Text scoping: pick which pages feed a prompt block.
//!
//! Each prompt block asks for text by a ranked list of [`TextStrategy`]
//! values. The first strategy that yields non-blank text wins, and its label
//! is recorded next to the text so the persisted document shows whether a
//! block came from a matched section or from a blind page window.

use crate::document::Page;
use crate::outline::Section;
use crate::prompts::truncate_chars;
use std::fmt;

/// One way of gathering page text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextStrategy {
    /// Pages of every section whose name contains one of the keywords
    /// (case-insensitive substring match).
    Sections(&'static [&'static str]),
    /// The first `n` pages.
    LeadingPages(usize),
    /// The last `n` pages.
    TrailingPages(usize),
}

impl fmt::Display for TextStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextStrategy::Sections(keywords) => write!(f, "sections[{}]", keywords.join(",")),
            TextStrategy::LeadingPages(n) => write!(f, "leading_pages({n})"),
            TextStrategy::TrailingPages(n) => write!(f, "trailing_pages({n})"),
        }
    }
}

/// Text gathered for one prompt block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedText {
    pub text: String,
    /// Label of the winning strategy, or `"none"` if every strategy came up
    /// empty.
    pub strategy: String,
}

/// Sections whose name contains any keyword. Each section appears once, in
/// outline order, however many keywords it matches.
pub fn matching_sections<'a>(sections: &'a [Section], keywords: &[&str]) -> Vec<&'a Section> {
    sections
        .iter()
        .filter(|s| {
            let name = s.name.trim().to_lowercase();
            keywords.iter().any(|k| name.contains(k))
        })
        .collect()
}

/// `[PAGE n]\n{text}` blocks joined by blank lines.
pub fn render_pages<'a>(pages: impl IntoIterator<Item = &'a Page>) -> String {
    pages
        .into_iter()
        .map(|p| format!("[PAGE {}]\n{}", p.page_number, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn apply(strategy: &TextStrategy, pages: &[Page], sections: &[Section]) -> String {
    match strategy {
        TextStrategy::Sections(keywords) => {
            let matched = matching_sections(sections, keywords);
            // Section order, then page order within each section; a page shared
            // by two matched sections is rendered for each.
            let selected = matched.iter().flat_map(|s| {
                pages
                    .iter()
                    .filter(move |p| s.contains_page(p.page_number))
            });
            render_pages(selected)
        }
        TextStrategy::LeadingPages(n) => render_pages(pages.iter().take(*n)),
        TextStrategy::TrailingPages(n) => {
            render_pages(pages.iter().skip(pages.len().saturating_sub(*n)))
        }
    }
}

/// Run `strategies` in order; the first with non-blank text wins. The text is
/// truncated to `max_chars` characters.
pub fn gather_text(
    pages: &[Page],
    sections: &[Section],
    strategies: &[TextStrategy],
    max_chars: usize,
) -> ScopedText {
    for strategy in strategies {
        let text = apply(strategy, pages, sections);
        if !text.trim().is_empty() {
            return ScopedText {
                text: truncate_chars(&text, max_chars).to_string(),
                strategy: strategy.to_string(),
            };
        }
    }
    ScopedText {
        text: String::new(),
        strategy: "none".to_string(),
    }
}
